//! オブジェクトのプロパティ

use crate::access::MemoryAccessResult;

/// プロパティの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PropertyKind {
    /// 単一の値
    Single = 0,
    /// 要素数が分かっている配列
    ArrayOfKnownSize = 1,
    /// 要素数を読み取るアドレスが無効だった配列
    ArrayOfUnknownSizeDueToInvalidMemory = 2,
    /// 要素数を読み取るアドレスは有効だが読めなかった配列
    ArrayOfUnknownSizeDueToValidButInaccessibleMemory = 3,
}

impl PropertyKind {
    /// 配列の種類か
    pub fn is_array(&self) -> bool {
        !matches!(self, PropertyKind::Single)
    }

    /// 要素数が不明な配列か
    pub fn is_unknown_size(&self) -> bool {
        matches!(
            self,
            PropertyKind::ArrayOfUnknownSizeDueToInvalidMemory
                | PropertyKind::ArrayOfUnknownSizeDueToValidButInaccessibleMemory
        )
    }
}

/// 配列長の読み取り結果から配列の種類を決める
///
/// 読み取りに失敗しても構築を中断せず、要素数不明の種類に落とします。
pub fn get_array_kind(mem_result: MemoryAccessResult) -> PropertyKind {
    match mem_result {
        MemoryAccessResult::Ok => PropertyKind::ArrayOfKnownSize,
        MemoryAccessResult::AddressNotValid | MemoryAccessResult::Moved { .. } => {
            PropertyKind::ArrayOfUnknownSizeDueToInvalidMemory
        }
        MemoryAccessResult::AddressValidButInaccessible | MemoryAccessResult::Partial { .. } => {
            PropertyKind::ArrayOfUnknownSizeDueToValidButInaccessibleMemory
        }
    }
}

/// オブジェクトの名前付き・型付きプロパティ
///
/// 構築後は変更しません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectProperty {
    name: String,
    type_name: String,
    decompressed_type: String,
    address: u64,
    num_values: u64,
    kind: PropertyKind,
    validity: MemoryAccessResult,
}

impl ObjectProperty {
    /// 単一値のプロパティを作成する
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        decompressed_type: impl Into<String>,
        address: u64,
    ) -> Self {
        Self::array(
            name,
            type_name,
            decompressed_type,
            address,
            1,
            PropertyKind::Single,
        )
    }

    /// 配列のプロパティを作成する
    pub fn array(
        name: impl Into<String>,
        type_name: impl Into<String>,
        decompressed_type: impl Into<String>,
        address: u64,
        num_values: u64,
        kind: PropertyKind,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            decompressed_type: decompressed_type.into(),
            address,
            num_values,
            kind,
            validity: MemoryAccessResult::Ok,
        }
    }

    /// 値の読み取り結果を記録する
    pub fn with_validity(mut self, validity: MemoryAccessResult) -> Self {
        self.validity = validity;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 宣言された型名（圧縮ポインタのエイリアスの場合がある）
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// 展開後の型名
    pub fn decompressed_type(&self) -> &str {
        &self.decompressed_type
    }

    /// 値が始まるデバッグ対象のアドレス
    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn num_values(&self) -> u64 {
        self.num_values
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn validity(&self) -> MemoryAccessResult {
        self.validity
    }

    /// 値を読み取れたか
    pub fn is_readable(&self) -> bool {
        self.validity.is_ok()
    }
}

impl std::fmt::Display for ObjectProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.decompressed_type)?;
        if self.type_name != self.decompressed_type {
            write!(f, " (as {})", self.type_name)?;
        }
        write!(f, " @ 0x{:x}", self.address)?;
        match self.kind {
            PropertyKind::Single => {}
            PropertyKind::ArrayOfKnownSize => write!(f, " [{}]", self.num_values)?,
            _ => write!(f, " [?]")?,
        }
        if !self.is_readable() {
            write!(f, " <unreadable: {}>", self.validity)?;
        }
        Ok(())
    }
}
