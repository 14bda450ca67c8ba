use std::mem::ManuallyDrop;
use std::ptr;

mod sealed {
    pub trait Sealed {}
}

/// A tuple of scope-bound elements that a [`GuardPack`] can tear down in
/// strict reverse construction order. Implemented for tuples of arity 1
/// through 6.
///
/// [`GuardPack`] 能以与构造严格相反的顺序拆毁的作用域绑定元素元组。
/// 已为 1 到 6 元的元组实现。
pub trait Pack: sealed::Sealed {
    /// Number of elements in the pack.
    /// 组中元素的数量。
    const LEN: usize;

    #[doc(hidden)]
    unsafe fn drop_in_reverse(this: &mut ManuallyDrop<Self>)
    where
        Self: Sized;
}

/// Compile-time indexed access into a [`Pack`] tuple. An out-of-bounds
/// index is a missing impl, rejected at compile time.
///
/// 对 [`Pack`] 元组的编译期索引访问。越界索引对应缺失的实现，
/// 在编译期即被拒绝。
pub trait PackElement<const I: usize>: Pack {
    type Element;

    fn element(&self) -> &Self::Element;
}

/// Composes guards over several sources into one scope-bound aggregate.
///
/// Elements are constructed left-to-right (the [`guard_pack!`] macro loads
/// each store in argument order) and destroyed strictly right-to-left. If a
/// constructor panics mid-build, the elements already built unwind in
/// reverse before the panic escapes; no partially initialized pack is ever
/// observable.
///
/// Because each element is a guard over its own source's own thread-local
/// slot, the pack inherits snapshot isolation per source; across sources
/// the coherence is exactly what guards give — no global consistent cut.
///
/// # Example
/// ```
/// use rcu_store::{guard_pack, Store};
///
/// let numbers = Store::with_value(10u32);
/// let labels = Store::with_value(String::from("hello"));
///
/// let pack = guard_pack!(numbers, labels);
/// assert_eq!(**pack.get::<0>(), 10);
/// assert_eq!(pack.get::<1>().as_str(), "hello");
/// ```
///
/// 将多个数据源上的守卫组合为一个作用域绑定的聚合体。
/// 元素从左到右构造（[`guard_pack!`] 宏按参数顺序加载每个 store），
/// 并严格地从右到左析构。若构造中途 panic，
/// 已构造的元素会在 panic 逃逸之前按相反顺序展开；
/// 永远观察不到部分初始化的组。
/// 由于每个元素都是各自数据源在各自线程本地槽位上的守卫，
/// 组按数据源继承快照隔离；跨数据源的一致性就是守卫本身给出的那些
/// —— 不存在全局一致切面。
pub struct GuardPack<P: Pack> {
    elements: ManuallyDrop<P>,
}

impl<P: Pack> GuardPack<P> {
    /// Build a pack from already-constructed elements. Taking the tuple by
    /// value is what restricts intake to rvalue guards.
    ///
    /// 从已构造的元素构建组。按值接收元组正是只接受右值守卫的原因。
    #[inline]
    pub fn new(elements: P) -> Self {
        Self {
            elements: ManuallyDrop::new(elements),
        }
    }

    /// Element at compile-time index `I`, in construction order.
    /// 构造顺序下编译期索引 `I` 处的元素。
    #[inline]
    pub fn get<const I: usize>(&self) -> &P::Element
    where
        P: PackElement<I>,
    {
        self.elements.element()
    }

    /// Number of elements.
    /// 元素数量。
    #[inline]
    pub fn len(&self) -> usize {
        P::LEN
    }

    /// Always `false`: packs of arity zero do not exist.
    /// 恒为 `false`：不存在零元的组。
    #[inline]
    pub fn is_empty(&self) -> bool {
        P::LEN == 0
    }
}

impl<P: Pack> Drop for GuardPack<P> {
    fn drop(&mut self) {
        // SAFETY: the elements were never dropped elsewhere (`ManuallyDrop`)
        // and each impl drops every field exactly once, last field first.
        unsafe { P::drop_in_reverse(&mut self.elements) }
    }
}

macro_rules! impl_pack {
    ($len:expr, [$($T:ident),+], [$($rev:tt),+]) => {
        impl<$($T),+> sealed::Sealed for ($($T,)+) {}

        impl<$($T),+> Pack for ($($T,)+) {
            const LEN: usize = $len;

            unsafe fn drop_in_reverse(this: &mut ManuallyDrop<Self>) {
                let elements: &mut Self = this;
                $(
                    unsafe { ptr::drop_in_place(&mut elements.$rev); }
                )+
            }
        }
    };
}

macro_rules! impl_pack_element {
    ($idx:tt, $E:ident, [$($T:ident),+]) => {
        impl<$($T),+> PackElement<$idx> for ($($T,)+) {
            type Element = $E;

            #[inline]
            fn element(&self) -> &$E {
                &self.$idx
            }
        }
    };
}

impl_pack!(1, [A], [0]);
impl_pack!(2, [A, B], [1, 0]);
impl_pack!(3, [A, B, C], [2, 1, 0]);
impl_pack!(4, [A, B, C, D], [3, 2, 1, 0]);
impl_pack!(5, [A, B, C, D, E], [4, 3, 2, 1, 0]);
impl_pack!(6, [A, B, C, D, E, F], [5, 4, 3, 2, 1, 0]);

impl_pack_element!(0, A, [A]);

impl_pack_element!(0, A, [A, B]);
impl_pack_element!(1, B, [A, B]);

impl_pack_element!(0, A, [A, B, C]);
impl_pack_element!(1, B, [A, B, C]);
impl_pack_element!(2, C, [A, B, C]);

impl_pack_element!(0, A, [A, B, C, D]);
impl_pack_element!(1, B, [A, B, C, D]);
impl_pack_element!(2, C, [A, B, C, D]);
impl_pack_element!(3, D, [A, B, C, D]);

impl_pack_element!(0, A, [A, B, C, D, E]);
impl_pack_element!(1, B, [A, B, C, D, E]);
impl_pack_element!(2, C, [A, B, C, D, E]);
impl_pack_element!(3, D, [A, B, C, D, E]);
impl_pack_element!(4, E, [A, B, C, D, E]);

impl_pack_element!(0, A, [A, B, C, D, E, F]);
impl_pack_element!(1, B, [A, B, C, D, E, F]);
impl_pack_element!(2, C, [A, B, C, D, E, F]);
impl_pack_element!(3, D, [A, B, C, D, E, F]);
impl_pack_element!(4, E, [A, B, C, D, E, F]);
impl_pack_element!(5, F, [A, B, C, D, E, F]);

/// Load each store left-to-right and compose the resulting guards into a
/// [`GuardPack`].
///
/// Equivalent to `GuardPack::new((a.load(), b.load(), …))`; tuple operands
/// evaluate in order, and a panic partway through unwinds the guards built
/// so far in reverse.
///
/// 按从左到右的顺序加载每个 store，并把得到的守卫组合成 [`GuardPack`]。
/// 等价于 `GuardPack::new((a.load(), b.load(), …))`；
/// 元组操作数按顺序求值，中途 panic 会按相反顺序展开已构造的守卫。
#[macro_export]
macro_rules! guard_pack {
    ($($store:expr),+ $(,)?) => {
        $crate::GuardPack::new(($($store.load(),)+))
    };
}
