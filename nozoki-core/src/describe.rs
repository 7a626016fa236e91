//! オブジェクト解析リクエスト
//!
//! タグ付きアドレスを分類し、マップから型を決めて、種別ごとのプロパティを列挙します。
//! メモリの読み取り失敗や型チェックの失敗はすべて結果のデータとして返ります。

use crate::access::{MemoryAccessResult, MemoryAccessor};
use crate::compression::is_smi;
use crate::config::InspectConfig;
use crate::object::{
    untagged, ObjectKind, ReadContext, HEAP_OBJECT_TAG, TAG_MASK, WEAK_HEAP_OBJECT_TAG,
};
use crate::result::{ObjectPropertiesResult, TypeCheckResult};
use tracing::debug;

/// アドレスが圧縮形かどうかの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerForm {
    /// アドレスの形から判断する
    #[default]
    Auto,
    /// 圧縮されているものとして扱う
    Compressed,
    /// 圧縮されていないものとして扱う
    Uncompressed,
}

/// 1つのオブジェクトの解析リクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRequest {
    /// 対象のタグ付きアドレス（またはSmi）
    pub address: u64,
    /// 想定する静的な型名
    pub type_hint: Option<String>,
    /// 圧縮形かどうかの扱い
    pub pointer_form: PointerForm,
    /// 圧縮ポインタの展開に使うヒープ内の任意のアドレス
    pub any_heap_pointer: Option<u64>,
}

impl ObjectRequest {
    pub fn new(address: u64) -> Self {
        Self {
            address,
            type_hint: None,
            pointer_form: PointerForm::Auto,
            any_heap_pointer: None,
        }
    }

    pub fn with_type_hint(mut self, type_hint: impl Into<String>) -> Self {
        self.type_hint = Some(type_hint.into());
        self
    }

    pub fn with_pointer_form(mut self, pointer_form: PointerForm) -> Self {
        self.pointer_form = pointer_form;
        self
    }

    pub fn with_heap_pointer(mut self, any_heap_pointer: u64) -> Self {
        self.any_heap_pointer = Some(any_heap_pointer);
        self
    }
}

/// オブジェクトを解析する
///
/// 必ず結果を返します。読めなかったフィールドはプロパティ単位で記録されます。
pub fn describe_object(
    request: &ObjectRequest,
    accessor: &dyn MemoryAccessor,
    config: &InspectConfig,
) -> ObjectPropertiesResult {
    let ctx = ReadContext::new(accessor, config);
    describe_tagged(&ctx, request, request.address)
}

fn describe_tagged(
    ctx: &ReadContext<'_>,
    request: &ObjectRequest,
    address: u64,
) -> ObjectPropertiesResult {
    let compression = ctx.config().compression;

    if is_smi(address) {
        let value = compression.smi_value(address);
        debug!("0x{:x} is a Smi ({})", address, value);
        return ObjectPropertiesResult::new(TypeCheckResult::Smi, value.to_string(), "Smi", Vec::new());
    }

    if address & TAG_MASK == WEAK_HEAP_OBJECT_TAG {
        let strong = (address & !TAG_MASK) | HEAP_OBJECT_TAG;
        debug!("0x{:x} is a weak reference to 0x{:x}", address, strong);
        let mut result = describe_tagged(ctx, request, strong);
        result.prepend("weak ref to ");
        return result;
    }

    let compressed = match request.pointer_form {
        PointerForm::Auto => compression.is_compressed(address),
        PointerForm::Compressed => true,
        PointerForm::Uncompressed => false,
    };
    if !compressed {
        return describe_heap_object(ctx, request, address);
    }

    match request
        .any_heap_pointer
        .and_then(|hint| compression.decompress(address, hint))
    {
        Some(full) => {
            debug!("Decompressed 0x{:x} to 0x{:x}", address, full);
            describe_heap_object(ctx, request, full)
        }
        None => {
            debug!("Unable to decompress 0x{:x}", address);
            let type_name = request
                .type_hint
                .as_deref()
                .and_then(ObjectKind::from_name)
                .map_or("Object", |kind| kind.name());
            ObjectPropertiesResult::new(
                TypeCheckResult::UnableToDecompress,
                format!("0x{:x} (compressed, no heap pointer to decompress)", address),
                type_name,
                Vec::new(),
            )
        }
    }
}

fn describe_heap_object(
    ctx: &ReadContext<'_>,
    request: &ObjectRequest,
    address: u64,
) -> ObjectPropertiesResult {
    let (object_start, map) = ctx.read_tagged_resolved(untagged(address));
    let resolved = object_start | HEAP_OBJECT_TAG;

    let from_map = match map.validity {
        MemoryAccessResult::Ok => kind_from_map(ctx, map.value, resolved),
        MemoryAccessResult::AddressNotValid | MemoryAccessResult::Moved { .. } => {
            Err(TypeCheckResult::ObjectPointerInvalid)
        }
        MemoryAccessResult::AddressValidButInaccessible | MemoryAccessResult::Partial { .. } => {
            Err(TypeCheckResult::ObjectPointerValidButInaccessible)
        }
    };
    let (kind, verdict) = choose_kind(from_map, request.type_hint.as_deref());
    debug!("0x{:x}: {} ({})", resolved, kind, verdict);

    let object = kind.create(resolved);
    let properties = object.properties(ctx);
    let brief = object
        .brief(ctx)
        .unwrap_or_else(|| format!("0x{:x} <{}>", resolved, object.name()));

    let mut result = ObjectPropertiesResult::new(verdict, brief, object.name(), properties);
    if resolved != address {
        result.prepend(&format!("0x{:x} moved to ", address));
    }
    result
}

/// マップの値からインスタンス型を読み、種別を引く
fn kind_from_map(
    ctx: &ReadContext<'_>,
    map: u64,
    object_address: u64,
) -> Result<ObjectKind, TypeCheckResult> {
    let config = ctx.config();
    let map_address = config
        .compression
        .decompress(map, object_address)
        .ok_or(TypeCheckResult::UnableToDecompress)?;

    let instance_type_address = untagged(map_address)
        .checked_add(config.instance_type_offset())
        .ok_or(TypeCheckResult::MapPointerInvalid)?;
    let (_, instance_type) = ctx.read_resolved::<u16>(instance_type_address);
    match instance_type.validity {
        MemoryAccessResult::Ok => config
            .instance_types
            .get(instance_type.value)
            .ok_or(TypeCheckResult::UnknownInstanceType),
        MemoryAccessResult::AddressNotValid | MemoryAccessResult::Moved { .. } => {
            Err(TypeCheckResult::MapPointerInvalid)
        }
        MemoryAccessResult::AddressValidButInaccessible | MemoryAccessResult::Partial { .. } => {
            Err(TypeCheckResult::MapPointerValidButInaccessible)
        }
    }
}

/// マップから得た種別と型ヒントから、使う種別と判定を決める
fn choose_kind(
    from_map: Result<ObjectKind, TypeCheckResult>,
    type_hint: Option<&str>,
) -> (ObjectKind, TypeCheckResult) {
    let hinted = type_hint.map(ObjectKind::from_name);
    match (from_map, hinted) {
        (Ok(kind), Some(Some(hint))) if !kind.is_subtype_of(hint) => {
            (kind, TypeCheckResult::TypeHintMismatch)
        }
        (Ok(kind), _) => (kind, TypeCheckResult::UsedMap),
        (Err(_), Some(Some(hint))) => (hint, TypeCheckResult::UsedTypeHint),
        (Err(_), Some(None)) => (ObjectKind::HeapObject, TypeCheckResult::UnknownTypeHint),
        (Err(failure), None) => (ObjectKind::HeapObject, failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::PointerCompression;
    use crate::property::PropertyKind;
    use crate::snapshot::SnapshotMemory;

    const CAGE: u64 = 0x7f00_0000_0000;
    const MAP: u64 = CAGE + 0x100;
    const ARRAY: u64 = CAGE + 0x2000;
    const FIXED_ARRAY_TYPE: u16 = 0x83;

    /// 圧縮ありのヒープ: MAPはFixedArrayのマップ、ARRAYは長さ2のFixedArray
    fn heap() -> (SnapshotMemory, InspectConfig) {
        let mut config = InspectConfig::default();
        config
            .instance_types
            .insert(FIXED_ARRAY_TYPE, ObjectKind::FixedArray);

        let mut memory = SnapshotMemory::new();
        memory.add_region(MAP, vec![0u8; 0x10]);
        memory.write_u16(MAP + config.instance_type_offset(), FIXED_ARRAY_TYPE);

        memory.add_region(ARRAY, vec![0u8; 0x10]);
        let compression = config.compression;
        memory.write_u32(ARRAY, compression.compress(MAP + 1) as u32);
        memory.write_u32(ARRAY + 4, compression.smi_tagged(2) as u32);
        (memory, config)
    }

    #[test]
    fn test_describe_smi() {
        let config = InspectConfig::default();
        let memory = SnapshotMemory::new();
        let address = config.compression.smi_tagged(21);

        let result = describe_object(&ObjectRequest::new(address), &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::Smi);
        assert_eq!(result.brief(), "21");
        assert_eq!(result.type_name(), "Smi");
        assert!(result.properties().is_empty());
    }

    #[test]
    fn test_describe_uses_map() {
        let (memory, config) = heap();
        let result = describe_object(&ObjectRequest::new(ARRAY + 1), &memory, &config);

        assert_eq!(result.type_check_result(), TypeCheckResult::UsedMap);
        assert_eq!(result.type_name(), "FixedArray");
        assert_eq!(result.brief(), format!("0x{:x} <FixedArray>", ARRAY + 1));
        let objects = &result.properties()[2];
        assert_eq!(objects.name(), "objects");
        assert_eq!(objects.kind(), PropertyKind::ArrayOfKnownSize);
        assert_eq!(objects.num_values(), 2);
    }

    #[test]
    fn test_describe_compressed_address() {
        let (memory, config) = heap();
        let compressed = config.compression.compress(ARRAY + 1);

        let request = ObjectRequest::new(compressed).with_heap_pointer(MAP);
        let result = describe_object(&request, &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::UsedMap);
        assert_eq!(result.properties()[0].address(), ARRAY);

        let result = describe_object(&ObjectRequest::new(compressed), &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::UnableToDecompress);
        assert!(result.properties().is_empty());
    }

    #[test]
    fn test_describe_weak_reference() {
        let (memory, config) = heap();
        let result = describe_object(&ObjectRequest::new(ARRAY | 3), &memory, &config);

        assert_eq!(result.type_check_result(), TypeCheckResult::UsedMap);
        assert_eq!(
            result.brief(),
            format!("weak ref to 0x{:x} <FixedArray>", ARRAY + 1)
        );
    }

    #[test]
    fn test_describe_type_hint_mismatch() {
        let (memory, config) = heap();
        let request = ObjectRequest::new(ARRAY + 1).with_type_hint("JSArray");
        let result = describe_object(&request, &memory, &config);

        assert_eq!(result.type_check_result(), TypeCheckResult::TypeHintMismatch);
        assert_eq!(result.type_name(), "FixedArray");

        let request = ObjectRequest::new(ARRAY + 1).with_type_hint("FixedArrayBase");
        let result = describe_object(&request, &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::UsedMap);
    }

    #[test]
    fn test_describe_unreadable_object_uses_hint() {
        let (memory, config) = heap();
        let missing = CAGE + 0x9000 + 1;

        let result = describe_object(&ObjectRequest::new(missing), &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::ObjectPointerInvalid);
        assert_eq!(result.type_name(), "HeapObject");
        // 読めなくてもフィールドは列挙される
        assert_eq!(result.properties().len(), 1);
        assert!(!result.properties()[0].is_readable());

        let request = ObjectRequest::new(missing).with_type_hint("v8::internal::JSObject");
        let result = describe_object(&request, &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::UsedTypeHint);
        assert_eq!(result.type_name(), "JSObject");
        assert_eq!(result.properties().len(), 3);

        let request = ObjectRequest::new(missing).with_type_hint("Whatever");
        let result = describe_object(&request, &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::UnknownTypeHint);
    }

    #[test]
    fn test_describe_map_failures() {
        let (mut memory, mut config) = heap();
        let other = CAGE + 0x3000;
        memory.add_region(other, vec![0u8; 8]);
        // 存在しないマップを指す
        memory.write_u32(other, 0x0000_9001);

        let result = describe_object(&ObjectRequest::new(other + 1), &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::MapPointerInvalid);

        config.instance_types = Default::default();
        let result = describe_object(&ObjectRequest::new(ARRAY + 1), &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::UnknownInstanceType);
        assert_eq!(result.type_name(), "HeapObject");
    }

    #[test]
    fn test_describe_follows_moved_object() {
        let (mut memory, config) = heap();
        let old = CAGE + 0x5000;
        memory.add_forward(old, ARRAY);

        let result = describe_object(&ObjectRequest::new(old + 1), &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::UsedMap);
        assert_eq!(result.properties()[0].address(), ARRAY);
        assert!(result
            .brief()
            .starts_with(&format!("0x{:x} moved to 0x{:x}", old + 1, ARRAY + 1)));
    }

    #[test]
    fn test_describe_uncompressed_heap() {
        let mut config = InspectConfig {
            compression: PointerCompression::disabled(),
            ..InspectConfig::default()
        };
        config.instance_types.insert(0x10, ObjectKind::JSArray);

        let mut memory = SnapshotMemory::new();
        let map = 0x1000u64;
        let array = 0x2000u64;
        memory.add_region(map, vec![0u8; 0x10]);
        memory.write_u16(map + config.instance_type_offset(), 0x10);
        memory.add_region(array, vec![0u8; 0x20]);
        memory.write_u64(array, map + 1);

        let request = ObjectRequest::new(array + 1).with_pointer_form(PointerForm::Uncompressed);
        let result = describe_object(&request, &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::UsedMap);
        assert_eq!(result.type_name(), "JSArray");
        assert_eq!(result.properties().len(), 4);
        assert!(result.properties().iter().all(|p| p.is_readable()));
    }

    #[test]
    fn test_describe_garbage_map_word() {
        let config = InspectConfig {
            compression: PointerCompression::disabled(),
            ..InspectConfig::default()
        };
        let mut memory = SnapshotMemory::new();
        memory.add_region(0x2000, vec![0xff; 0x20]);

        let request = ObjectRequest::new(0x2001).with_pointer_form(PointerForm::Uncompressed);
        let result = describe_object(&request, &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::MapPointerInvalid);
        assert_eq!(result.type_name(), "HeapObject");
        assert!(result.properties()[0].is_readable());
    }

    #[test]
    fn test_describe_address_at_end_of_address_space() {
        let config = InspectConfig {
            compression: PointerCompression::disabled(),
            ..InspectConfig::default()
        };
        let memory = SnapshotMemory::new();

        let request = ObjectRequest::new(0xffff_ffff_ffff_fff5).with_type_hint("JSArray");
        let result = describe_object(&request, &memory, &config);
        assert_eq!(result.type_check_result(), TypeCheckResult::UsedTypeHint);
        assert_eq!(result.type_name(), "JSArray");
        assert_eq!(result.properties().len(), 4);
        assert!(result.properties().iter().all(|p| !p.is_readable()));
    }
}
