//! オブジェクトモデルの基本契約
//!
//! デバッグ対象のオブジェクトはアドレスだけで識別されます。
//! 種別ごとの実装は `objects` にあり、`ObjectKind` の表から生成されます。

use crate::access::{read_value, MemoryAccessResult, MemoryAccessor, MemoryReadable, Value};
use crate::config::InspectConfig;
use crate::errors::ObjectKindError;
use crate::objects::{
    TqFixedArray, TqFixedArrayBase, TqHeapNumber, TqHeapObject, TqJSArray, TqJSObject,
    TqSeqOneByteString, TqString,
};
use crate::property::{get_array_kind, ObjectProperty, PropertyKind};

/// ヒープオブジェクトのタグ
pub const HEAP_OBJECT_TAG: u64 = 1;
/// 弱参照のタグ
pub const WEAK_HEAP_OBJECT_TAG: u64 = 3;
/// タグのマスク
pub const TAG_MASK: u64 = 3;

/// タグを取り除いたアドレス
pub fn untagged(address: u64) -> u64 {
    address & !TAG_MASK
}

/// オブジェクト種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    HeapObject,
    HeapNumber,
    FixedArrayBase,
    FixedArray,
    String,
    SeqOneByteString,
    JSObject,
    JSArray,
}

impl ObjectKind {
    /// すべての種別
    pub const ALL: [ObjectKind; 8] = [
        ObjectKind::HeapObject,
        ObjectKind::HeapNumber,
        ObjectKind::FixedArrayBase,
        ObjectKind::FixedArray,
        ObjectKind::String,
        ObjectKind::SeqOneByteString,
        ObjectKind::JSObject,
        ObjectKind::JSArray,
    ];

    /// 静的な型名
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::HeapObject => "HeapObject",
            ObjectKind::HeapNumber => "HeapNumber",
            ObjectKind::FixedArrayBase => "FixedArrayBase",
            ObjectKind::FixedArray => "FixedArray",
            ObjectKind::String => "String",
            ObjectKind::SeqOneByteString => "SeqOneByteString",
            ObjectKind::JSObject => "JSObject",
            ObjectKind::JSArray => "JSArray",
        }
    }

    /// 親の種別
    pub fn parent(&self) -> Option<ObjectKind> {
        match self {
            ObjectKind::HeapObject => None,
            ObjectKind::HeapNumber
            | ObjectKind::FixedArrayBase
            | ObjectKind::String
            | ObjectKind::JSObject => Some(ObjectKind::HeapObject),
            ObjectKind::FixedArray => Some(ObjectKind::FixedArrayBase),
            ObjectKind::SeqOneByteString => Some(ObjectKind::String),
            ObjectKind::JSArray => Some(ObjectKind::JSObject),
        }
    }

    /// `self` が `other` 自身またはその子孫か
    pub fn is_subtype_of(&self, other: ObjectKind) -> bool {
        let mut current = Some(*self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    /// 型名から種別を引く（名前空間付きの名前も受け付ける）
    pub fn from_name(name: &str) -> Option<ObjectKind> {
        let short = name.rsplit("::").next().unwrap_or(name).trim();
        Self::ALL.iter().copied().find(|kind| kind.name() == short)
    }

    /// 種別に対応するオブジェクトを生成する
    pub fn create(&self, address: u64) -> Box<dyn TqObject> {
        match self {
            ObjectKind::HeapObject => Box::new(TqHeapObject::new(address)),
            ObjectKind::HeapNumber => Box::new(TqHeapNumber::new(address)),
            ObjectKind::FixedArrayBase => Box::new(TqFixedArrayBase::new(address)),
            ObjectKind::FixedArray => Box::new(TqFixedArray::new(address)),
            ObjectKind::String => Box::new(TqString::new(address)),
            ObjectKind::SeqOneByteString => Box::new(TqSeqOneByteString::new(address)),
            ObjectKind::JSObject => Box::new(TqJSObject::new(address)),
            ObjectKind::JSArray => Box::new(TqJSArray::new(address)),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ObjectKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ObjectKindError(s.to_string()))
    }
}

/// プロパティ列挙時の読み取りコンテキスト
pub struct ReadContext<'a> {
    accessor: &'a dyn MemoryAccessor,
    config: &'a InspectConfig,
}

impl<'a> ReadContext<'a> {
    pub fn new(accessor: &'a dyn MemoryAccessor, config: &'a InspectConfig) -> Self {
        Self { accessor, config }
    }

    pub fn accessor(&self) -> &'a dyn MemoryAccessor {
        self.accessor
    }

    pub fn config(&self) -> &'a InspectConfig {
        self.config
    }

    /// タグ付き値1つ分のサイズ
    pub fn tagged_size(&self) -> u64 {
        self.config.compression.tagged_size()
    }

    /// タグ付きフィールドの宣言型名
    pub fn tagged_type(&self) -> &'static str {
        if self.config.compression.enabled {
            "TaggedValue"
        } else {
            "uintptr_t"
        }
    }

    /// 型付き値を読み取る
    pub fn read<T: MemoryReadable>(&self, address: u64) -> Value<T> {
        read_value(self.accessor, address)
    }

    /// タグ付き値を読み取る（圧縮時は32ビット）
    pub fn read_tagged(&self, address: u64) -> Value<u64> {
        if self.config.compression.enabled {
            self.read::<u32>(address).map(u64::from)
        } else {
            self.read::<u64>(address)
        }
    }

    /// Smiとして格納された整数を読み取る
    pub fn read_smi(&self, address: u64) -> Value<i64> {
        let compression = self.config.compression;
        self.read_tagged(address)
            .map(|tagged| compression.smi_value(tagged))
    }

    /// タグ付きフィールドのプロパティ
    pub fn tagged_property(&self, name: &str, decompressed_type: &str, address: u64) -> ObjectProperty {
        let probe = self.read_tagged(address);
        ObjectProperty::new(name, self.tagged_type(), decompressed_type, address)
            .with_validity(probe.validity)
    }

    /// スカラーフィールドのプロパティ
    pub fn scalar_property<T: MemoryReadable>(
        &self,
        name: &str,
        type_name: &str,
        address: u64,
    ) -> ObjectProperty {
        let probe = self.read::<T>(address);
        ObjectProperty::new(name, type_name, type_name, address).with_validity(probe.validity)
    }

    /// 長さを読み取った結果から配列のプロパティを作る
    ///
    /// 長さが読めなかった場合は要素数0の「不明」な配列になります。
    pub fn array_property(
        &self,
        name: &str,
        type_name: &str,
        decompressed_type: &str,
        address: u64,
        length: &Value<i64>,
    ) -> ObjectProperty {
        let kind = get_array_kind(length.validity);
        let num_values = match kind {
            PropertyKind::ArrayOfKnownSize => u64::try_from(length.value).unwrap_or(0),
            _ => 0,
        };
        ObjectProperty::array(name, type_name, decompressed_type, address, num_values, kind)
            .with_validity(length.validity)
    }

    /// `address` から読み取り、「移動済み」を最大 `max_forwarding_hops` 回まで辿る
    ///
    /// 最終的に読み取ったアドレスと値を返します。
    pub fn read_resolved<T: MemoryReadable>(&self, address: u64) -> (u64, Value<T>) {
        let mut current = address;
        for _ in 0..=self.config.max_forwarding_hops {
            let value = self.read::<T>(current);
            match value.validity {
                MemoryAccessResult::Moved { to } => {
                    tracing::debug!("0x{:x} moved to 0x{:x}", current, to);
                    current = to;
                }
                _ => return (current, value),
            }
        }
        tracing::warn!(
            "Gave up following forwarding from 0x{:x} after {} hops",
            address,
            self.config.max_forwarding_hops
        );
        (current, Value::new(MemoryAccessResult::AddressNotValid, T::default()))
    }

    /// タグ付き値を「移動済み」を辿りながら読み取る
    pub fn read_tagged_resolved(&self, address: u64) -> (u64, Value<u64>) {
        if self.config.compression.enabled {
            let (resolved, value) = self.read_resolved::<u32>(address);
            (resolved, value.map(u64::from))
        } else {
            self.read_resolved::<u64>(address)
        }
    }
}

/// デバッグ対象のアドレス空間にあるオブジェクト
///
/// アドレスは構築時に決まり、以後変わりません。
pub trait TqObject {
    /// タグ付きアドレス
    fn address(&self) -> u64;

    /// 静的な型名
    fn name(&self) -> &'static str {
        "Object"
    }

    /// プロパティを宣言順に列挙する
    fn properties(&self, _ctx: &ReadContext<'_>) -> Vec<ObjectProperty> {
        Vec::new()
    }

    /// 種別固有の一行説明（文字列の内容など）
    fn brief(&self, _ctx: &ReadContext<'_>) -> Option<String> {
        None
    }

    /// 種別に応じたビジターのメソッドを呼ぶ
    fn visit(&self, visitor: &mut dyn TqObjectVisitor);
}

/// 種別ごとのダブルディスパッチ
///
/// 各メソッドの既定実装は親の種別のメソッドに委譲し、最後は `visit_object` に至ります。
pub trait TqObjectVisitor {
    fn visit_object(&mut self, _object: &dyn TqObject) {}

    fn visit_heap_object(&mut self, object: &TqHeapObject) {
        self.visit_object(object)
    }

    fn visit_heap_number(&mut self, object: &TqHeapNumber) {
        self.visit_heap_object(object.base())
    }

    fn visit_fixed_array_base(&mut self, object: &TqFixedArrayBase) {
        self.visit_heap_object(object.base())
    }

    fn visit_fixed_array(&mut self, object: &TqFixedArray) {
        self.visit_fixed_array_base(object.base())
    }

    fn visit_string(&mut self, object: &TqString) {
        self.visit_heap_object(object.base())
    }

    fn visit_seq_one_byte_string(&mut self, object: &TqSeqOneByteString) {
        self.visit_string(object.base())
    }

    fn visit_js_object(&mut self, object: &TqJSObject) {
        self.visit_heap_object(object.base())
    }

    fn visit_js_array(&mut self, object: &TqJSArray) {
        self.visit_js_object(object.base())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.create(0x1001).name(), kind.name());
        }
        assert_eq!(
            ObjectKind::from_name("v8::internal::JSArray"),
            Some(ObjectKind::JSArray)
        );
        assert_eq!(ObjectKind::from_name("Nope"), None);
        assert!("Nope".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn test_is_subtype_of() {
        assert!(ObjectKind::JSArray.is_subtype_of(ObjectKind::JSObject));
        assert!(ObjectKind::JSArray.is_subtype_of(ObjectKind::HeapObject));
        assert!(ObjectKind::FixedArray.is_subtype_of(ObjectKind::FixedArray));
        assert!(!ObjectKind::JSObject.is_subtype_of(ObjectKind::JSArray));
        assert!(!ObjectKind::String.is_subtype_of(ObjectKind::FixedArrayBase));
    }

    #[test]
    fn test_array_property_clamps_negative_length() {
        let config = InspectConfig::default();
        let memory = |_: u64, _: &mut [u8]| MemoryAccessResult::AddressNotValid;
        let ctx = ReadContext::new(&memory, &config);

        let negative = Value::new(MemoryAccessResult::Ok, -4i64);
        let prop = ctx.array_property("items", "int", "int", 0x10, &negative);
        assert_eq!(prop.kind(), PropertyKind::ArrayOfKnownSize);
        assert_eq!(prop.num_values(), 0);

        let failed = Value::new(MemoryAccessResult::AddressValidButInaccessible, 99i64);
        let prop = ctx.array_property("items", "int", "int", 0x10, &failed);
        assert_eq!(
            prop.kind(),
            PropertyKind::ArrayOfUnknownSizeDueToValidButInaccessibleMemory
        );
        assert_eq!(prop.num_values(), 0);
        assert!(!prop.is_readable());
    }

    #[test]
    fn test_read_resolved_follows_forwarding() {
        let config = InspectConfig::default();
        let memory = |address: u64, buf: &mut [u8]| match address {
            0x100 => MemoryAccessResult::Moved { to: 0x200 },
            0x200 => MemoryAccessResult::Moved { to: 0x300 },
            0x300 => {
                buf.copy_from_slice(&7u32.to_le_bytes());
                MemoryAccessResult::Ok
            }
            _ => MemoryAccessResult::AddressNotValid,
        };
        let ctx = ReadContext::new(&memory, &config);

        let (address, value) = ctx.read_resolved::<u32>(0x100);
        assert_eq!(address, 0x300);
        assert_eq!(value.get(), Some(&7));
    }

    #[test]
    fn test_read_resolved_gives_up_on_cycles() {
        let config = InspectConfig {
            max_forwarding_hops: 2,
            ..InspectConfig::default()
        };
        let memory = |address: u64, _: &mut [u8]| MemoryAccessResult::Moved { to: address ^ 0x10 };
        let ctx = ReadContext::new(&memory, &config);

        let (_, value) = ctx.read_resolved::<u32>(0x100);
        assert_eq!(value.validity, MemoryAccessResult::AddressNotValid);
    }
}
