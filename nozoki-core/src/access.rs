//! メモリアクセス抽象
//!
//! デバッグ対象のメモリ読み取りはホスト側が提供します。
//! 読み取りの失敗はすべて `MemoryAccessResult` で表現され、パニックやエラー伝播はしません。

use crate::Result;

/// メモリ読み取りの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccessResult {
    /// 要求したバイト数をすべて読み取れた
    Ok,
    /// アドレスがマッピングされていない
    AddressNotValid,
    /// アドレスは有効だが読み取れない（保護、ダンプに含まれていない等）
    AddressValidButInaccessible,
    /// 先頭 `read` バイトだけ読み取れた
    Partial { read: usize },
    /// オブジェクトが移動済み。同じ読み取りを `to` から再発行する必要がある
    Moved { to: u64 },
}

impl MemoryAccessResult {
    /// 読み取りが成功したか
    pub fn is_ok(&self) -> bool {
        matches!(self, MemoryAccessResult::Ok)
    }

    /// 公開ビュー用の固定幅コード
    pub fn code(&self) -> u8 {
        match self {
            MemoryAccessResult::Ok => 0,
            MemoryAccessResult::AddressNotValid => 1,
            MemoryAccessResult::AddressValidButInaccessible => 2,
            MemoryAccessResult::Partial { .. } => 3,
            MemoryAccessResult::Moved { .. } => 4,
        }
    }
}

impl std::fmt::Display for MemoryAccessResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MemoryAccessResult::Ok => write!(f, "ok"),
            MemoryAccessResult::AddressNotValid => write!(f, "address not valid"),
            MemoryAccessResult::AddressValidButInaccessible => {
                write!(f, "address valid but inaccessible")
            }
            MemoryAccessResult::Partial { read } => write!(f, "partial read ({} bytes)", read),
            MemoryAccessResult::Moved { to } => write!(f, "moved to 0x{:x}", to),
        }
    }
}

/// デバッグ対象メモリへのアクセス手段
///
/// 任意の（未検証の）アドレスで呼ばれても安全でなければなりません。
/// `buf` の内容が意味を持つのは `Ok`（または `Partial` の先頭部分）のときだけです。
pub trait MemoryAccessor {
    /// `address` から `buf.len()` バイトを読み取る
    fn read(&self, address: u64, buf: &mut [u8]) -> MemoryAccessResult;
}

impl<F> MemoryAccessor for F
where
    F: Fn(u64, &mut [u8]) -> MemoryAccessResult,
{
    fn read(&self, address: u64, buf: &mut [u8]) -> MemoryAccessResult {
        self(address, buf)
    }
}

/// メモリから読み取った値
///
/// `value` が意味を持つのは `validity` が `Ok` のときだけです。
/// 失敗した読み取りでは `T::default()` が入ります。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Value<T> {
    pub validity: MemoryAccessResult,
    pub value: T,
}

impl<T> Value<T> {
    pub fn new(validity: MemoryAccessResult, value: T) -> Self {
        Self { validity, value }
    }

    /// 読み取りに成功していれば値を返す
    pub fn get(&self) -> Option<&T> {
        if self.validity.is_ok() {
            Some(&self.value)
        } else {
            None
        }
    }

    /// 読み取り結果を保ったまま値を変換する
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Value<U> {
        Value {
            validity: self.validity,
            value: f(self.value),
        }
    }
}

/// メモリから読み取り可能な固定幅の型
pub trait MemoryReadable: Sized + Default {
    /// リトルエンディアンのバイト列から値を構築
    fn from_le_bytes(bytes: &[u8]) -> Result<Self>;

    /// 型のサイズ（バイト数）
    fn size() -> usize;
}

macro_rules! impl_memory_readable {
    ($($ty:ty),*) => {
        $(
            impl MemoryReadable for $ty {
                fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
                    let array: [u8; std::mem::size_of::<$ty>()] = bytes.try_into().map_err(|_| {
                        anyhow::anyhow!(
                            "Failed to convert {} bytes to {} (expected {} bytes)",
                            bytes.len(),
                            stringify!($ty),
                            std::mem::size_of::<$ty>()
                        )
                    })?;
                    Ok(<$ty>::from_le_bytes(array))
                }

                fn size() -> usize {
                    std::mem::size_of::<$ty>()
                }
            }
        )*
    };
}

impl_memory_readable!(u8, u16, u32, u64, i32, i64, f64);

/// 型付き値を読み取る
///
/// 読み取りに失敗した場合も `Value` を返し、失敗理由を `validity` に保持します。
pub fn read_value<T: MemoryReadable>(accessor: &dyn MemoryAccessor, address: u64) -> Value<T> {
    let mut buf = vec![0u8; T::size()];
    match accessor.read(address, &mut buf) {
        MemoryAccessResult::Ok => match T::from_le_bytes(&buf) {
            Ok(value) => Value::new(MemoryAccessResult::Ok, value),
            Err(_) => Value::new(MemoryAccessResult::Partial { read: 0 }, T::default()),
        },
        other => Value::new(other, T::default()),
    }
}
