//! 組み込みのオブジェクト種別
//!
//! 各種別は親の種別を内包し、親のプロパティの後ろに自身のフィールドを追加します。
//! フィールドの位置はタグ付き値のサイズ `T`（圧縮時4、非圧縮時8）を単位とします。
//!
//! | 種別 | フィールド |
//! |---|---|
//! | HeapObject | `map` @0 |
//! | HeapNumber | `value` @T |
//! | FixedArrayBase | `length` @T |
//! | FixedArray | `objects[length]` @2T |
//! | String | `raw_hash_field` @T, `length` @T+4 |
//! | SeqOneByteString | `chars[length]` @T+8 |
//! | JSObject | `properties_or_hash` @T, `elements` @2T |
//! | JSArray | `length` @3T |

use crate::access::MemoryAccessResult;
use crate::object::{untagged, ReadContext, TqObject, TqObjectVisitor};
use crate::property::ObjectProperty;

/// ヒープ上のオブジェクト
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TqHeapObject {
    address: u64,
}

impl TqHeapObject {
    pub fn new(address: u64) -> Self {
        Self { address }
    }

    /// オブジェクト先頭から `offset` バイトのアドレス
    ///
    /// アドレス空間の末尾を越える場合は折り返し、その読み取りは失敗として記録されます。
    pub fn field_address(&self, offset: u64) -> u64 {
        untagged(self.address).wrapping_add(offset)
    }
}

impl TqObject for TqHeapObject {
    fn address(&self) -> u64 {
        self.address
    }

    fn name(&self) -> &'static str {
        "HeapObject"
    }

    fn properties(&self, ctx: &ReadContext<'_>) -> Vec<ObjectProperty> {
        vec![ctx.tagged_property("map", "Map", self.field_address(0))]
    }

    fn visit(&self, visitor: &mut dyn TqObjectVisitor) {
        visitor.visit_heap_object(self)
    }
}

/// ボックス化された浮動小数点数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TqHeapNumber {
    base: TqHeapObject,
}

impl TqHeapNumber {
    pub fn new(address: u64) -> Self {
        Self {
            base: TqHeapObject::new(address),
        }
    }

    pub fn base(&self) -> &TqHeapObject {
        &self.base
    }

    fn value_address(&self, ctx: &ReadContext<'_>) -> u64 {
        self.base.field_address(ctx.tagged_size())
    }
}

impl TqObject for TqHeapNumber {
    fn address(&self) -> u64 {
        self.base.address
    }

    fn name(&self) -> &'static str {
        "HeapNumber"
    }

    fn properties(&self, ctx: &ReadContext<'_>) -> Vec<ObjectProperty> {
        let mut props = self.base.properties(ctx);
        props.push(ctx.scalar_property::<f64>("value", "double", self.value_address(ctx)));
        props
    }

    fn brief(&self, ctx: &ReadContext<'_>) -> Option<String> {
        ctx.read::<f64>(self.value_address(ctx))
            .get()
            .map(|value| format!("{}", value))
    }

    fn visit(&self, visitor: &mut dyn TqObjectVisitor) {
        visitor.visit_heap_number(self)
    }
}

/// 長さを持つ配列の基底
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TqFixedArrayBase {
    base: TqHeapObject,
}

impl TqFixedArrayBase {
    pub fn new(address: u64) -> Self {
        Self {
            base: TqHeapObject::new(address),
        }
    }

    pub fn base(&self) -> &TqHeapObject {
        &self.base
    }

    fn length_address(&self, ctx: &ReadContext<'_>) -> u64 {
        self.base.field_address(ctx.tagged_size())
    }
}

impl TqObject for TqFixedArrayBase {
    fn address(&self) -> u64 {
        self.base.address
    }

    fn name(&self) -> &'static str {
        "FixedArrayBase"
    }

    fn properties(&self, ctx: &ReadContext<'_>) -> Vec<ObjectProperty> {
        let mut props = self.base.properties(ctx);
        props.push(ctx.tagged_property("length", "Smi", self.length_address(ctx)));
        props
    }

    fn visit(&self, visitor: &mut dyn TqObjectVisitor) {
        visitor.visit_fixed_array_base(self)
    }
}

/// タグ付き値の固定長配列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TqFixedArray {
    base: TqFixedArrayBase,
}

impl TqFixedArray {
    pub fn new(address: u64) -> Self {
        Self {
            base: TqFixedArrayBase::new(address),
        }
    }

    pub fn base(&self) -> &TqFixedArrayBase {
        &self.base
    }
}

impl TqObject for TqFixedArray {
    fn address(&self) -> u64 {
        self.base.base.address
    }

    fn name(&self) -> &'static str {
        "FixedArray"
    }

    fn properties(&self, ctx: &ReadContext<'_>) -> Vec<ObjectProperty> {
        let mut props = self.base.properties(ctx);
        let length = ctx.read_smi(self.base.length_address(ctx));
        props.push(ctx.array_property(
            "objects",
            ctx.tagged_type(),
            "Object",
            self.base.base.field_address(2 * ctx.tagged_size()),
            &length,
        ));
        props
    }

    fn visit(&self, visitor: &mut dyn TqObjectVisitor) {
        visitor.visit_fixed_array(self)
    }
}

/// 文字列の基底
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TqString {
    base: TqHeapObject,
}

impl TqString {
    pub fn new(address: u64) -> Self {
        Self {
            base: TqHeapObject::new(address),
        }
    }

    pub fn base(&self) -> &TqHeapObject {
        &self.base
    }

    fn length_address(&self, ctx: &ReadContext<'_>) -> u64 {
        self.base.field_address(ctx.tagged_size() + 4)
    }
}

impl TqObject for TqString {
    fn address(&self) -> u64 {
        self.base.address
    }

    fn name(&self) -> &'static str {
        "String"
    }

    fn properties(&self, ctx: &ReadContext<'_>) -> Vec<ObjectProperty> {
        let mut props = self.base.properties(ctx);
        props.push(ctx.scalar_property::<u32>(
            "raw_hash_field",
            "uint32_t",
            self.base.field_address(ctx.tagged_size()),
        ));
        props.push(ctx.scalar_property::<i32>("length", "int32_t", self.length_address(ctx)));
        props
    }

    fn visit(&self, visitor: &mut dyn TqObjectVisitor) {
        visitor.visit_string(self)
    }
}

/// 1バイト文字の連続した文字列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TqSeqOneByteString {
    base: TqString,
}

impl TqSeqOneByteString {
    pub fn new(address: u64) -> Self {
        Self {
            base: TqString::new(address),
        }
    }

    pub fn base(&self) -> &TqString {
        &self.base
    }

    fn chars_address(&self, ctx: &ReadContext<'_>) -> u64 {
        self.base.base.field_address(ctx.tagged_size() + 8)
    }
}

impl TqObject for TqSeqOneByteString {
    fn address(&self) -> u64 {
        self.base.base.address
    }

    fn name(&self) -> &'static str {
        "SeqOneByteString"
    }

    fn properties(&self, ctx: &ReadContext<'_>) -> Vec<ObjectProperty> {
        let mut props = self.base.properties(ctx);
        let length = ctx
            .read::<i32>(self.base.length_address(ctx))
            .map(i64::from);
        props.push(ctx.array_property("chars", "char", "char", self.chars_address(ctx), &length));
        props
    }

    fn brief(&self, ctx: &ReadContext<'_>) -> Option<String> {
        let length = *ctx.read::<i32>(self.base.length_address(ctx)).get()?;
        let length = usize::try_from(length).ok()?;
        let limit = length.min(ctx.config().max_string_chars);

        let mut chars = vec![0u8; limit];
        match ctx.accessor().read(self.chars_address(ctx), &mut chars) {
            MemoryAccessResult::Ok => {}
            MemoryAccessResult::Partial { read } => chars.truncate(read),
            _ => return None,
        }

        // 1バイト文字列はLatin-1
        let text: String = chars.iter().map(|&b| b as char).collect();
        let mut brief = format!("\"{}\"", text);
        if chars.len() < length {
            brief.push_str("...");
        }
        Some(brief)
    }

    fn visit(&self, visitor: &mut dyn TqObjectVisitor) {
        visitor.visit_seq_one_byte_string(self)
    }
}

/// JavaScriptのオブジェクト
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TqJSObject {
    base: TqHeapObject,
}

impl TqJSObject {
    pub fn new(address: u64) -> Self {
        Self {
            base: TqHeapObject::new(address),
        }
    }

    pub fn base(&self) -> &TqHeapObject {
        &self.base
    }
}

impl TqObject for TqJSObject {
    fn address(&self) -> u64 {
        self.base.address
    }

    fn name(&self) -> &'static str {
        "JSObject"
    }

    fn properties(&self, ctx: &ReadContext<'_>) -> Vec<ObjectProperty> {
        let t = ctx.tagged_size();
        let mut props = self.base.properties(ctx);
        props.push(ctx.tagged_property(
            "properties_or_hash",
            "Object",
            self.base.field_address(t),
        ));
        props.push(ctx.tagged_property(
            "elements",
            "FixedArrayBase",
            self.base.field_address(2 * t),
        ));
        props
    }

    fn visit(&self, visitor: &mut dyn TqObjectVisitor) {
        visitor.visit_js_object(self)
    }
}

/// JavaScriptの配列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TqJSArray {
    base: TqJSObject,
}

impl TqJSArray {
    pub fn new(address: u64) -> Self {
        Self {
            base: TqJSObject::new(address),
        }
    }

    pub fn base(&self) -> &TqJSObject {
        &self.base
    }
}

impl TqObject for TqJSArray {
    fn address(&self) -> u64 {
        self.base.base.address
    }

    fn name(&self) -> &'static str {
        "JSArray"
    }

    fn properties(&self, ctx: &ReadContext<'_>) -> Vec<ObjectProperty> {
        let mut props = self.base.properties(ctx);
        props.push(ctx.tagged_property(
            "length",
            "Number",
            self.base.base.field_address(3 * ctx.tagged_size()),
        ));
        props
    }

    fn visit(&self, visitor: &mut dyn TqObjectVisitor) {
        visitor.visit_js_array(self)
    }
}
