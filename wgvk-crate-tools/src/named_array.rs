/// 创建一个枚举以及与之一一对应的常量表
///
/// ```
/// use wgvk_crate_tools::enumed_map;
///
/// enumed_map!(pub Color<&'static str>: {
///     Red: "red",
///     Green: "green",
/// });
///
/// assert_eq!(Color::COUNT, 2);
/// assert_eq!(*Color::Green.value(), "green");
/// assert_eq!(Color::iter().map(|c| c.index()).collect::<Vec<_>>(), vec![0, 1]);
/// ```
#[macro_export]
macro_rules! enumed_map {
    ($vis:vis $enum_name:ident<$vtype:ty>: { $($variant:ident: $value:expr),* $(,)? }) => {
        #[repr(usize)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $enum_name {
            $($variant,)*
        }

        impl $enum_name {
            pub const COUNT: usize = $crate::count_indexed_array!($($variant),*);

            const VARIANTS: [Self; $crate::count_indexed_array!($($variant),*)] = [$(Self::$variant,)*];

            fn get_array() -> &'static [$vtype; Self::COUNT] {
                // 使用 OnceLock 实现延迟初始化的静态数组
                static ARRAY: std::sync::OnceLock<[$vtype; $crate::count_indexed_array!($($variant),*)]> =
                    std::sync::OnceLock::new();

                ARRAY.get_or_init(|| [
                    $($value,)*
                ])
            }

            #[inline]
            pub fn value(self) -> &'static $vtype {
                &Self::get_array()[self as usize]
            }

            #[inline]
            pub const fn index(self) -> usize {
                self as usize
            }

            pub fn iter() -> impl Iterator<Item = Self> {
                Self::VARIANTS.into_iter()
            }

            /// 整张表
            pub fn array() -> &'static [$vtype; Self::COUNT] {
                Self::get_array()
            }
        }
    };
}

/// 辅助宏，计算变体数量
#[macro_export]
macro_rules! count_indexed_array {
    () => (0);
    ($head:tt $(, $tail:tt)*) => (1 + $crate::count_indexed_array!($($tail),*));
}
