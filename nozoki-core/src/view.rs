//! 公開ビュー
//!
//! 所有している内部データから、ポインタとスカラーだけの平坦なビューを導出します。
//! ビューは常に内部データから作り直され、ビュー側を書き換えることはありません。
//!
//! - Rustの利用者向けには借用ビュー（`public_view()`）を提供し、寿命は借用チェッカーが保証します。
//! - 別バイナリの利用者向けには `#[repr(C)]` のレコードを `ViewArena` に置き、
//!   ハンドル1つで結果全体を解放できるようにします。

use crate::access::MemoryAccessResult;
use crate::errors::ViewError;
use crate::property::{ObjectProperty, PropertyKind};
use crate::result::{ObjectPropertiesResult, TypeCheckResult};
use std::collections::HashMap;
use std::ffi::{c_char, CString};
use tracing::debug;

/// プロパティの借用ビュー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectPropertyView<'a> {
    pub name: &'a str,
    pub type_name: &'a str,
    pub decompressed_type: &'a str,
    pub address: u64,
    pub num_values: u64,
    pub kind: PropertyKind,
    pub validity: MemoryAccessResult,
}

/// 解析結果の借用ビュー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPropertiesResultView<'a> {
    pub type_check_result: TypeCheckResult,
    pub brief: &'a str,
    pub type_name: &'a str,
    pub properties: Vec<ObjectPropertyView<'a>>,
}

impl ObjectPropertiesResultView<'_> {
    pub fn num_properties(&self) -> usize {
        self.properties.len()
    }
}

impl ObjectProperty {
    /// 借用ビューを導出する
    pub fn public_view(&self) -> ObjectPropertyView<'_> {
        ObjectPropertyView {
            name: self.name(),
            type_name: self.type_name(),
            decompressed_type: self.decompressed_type(),
            address: self.address(),
            num_values: self.num_values(),
            kind: self.kind(),
            validity: self.validity(),
        }
    }
}

impl ObjectPropertiesResult {
    /// 借用ビューを導出する（プロパティは宣言順）
    pub fn public_view(&self) -> ObjectPropertiesResultView<'_> {
        ObjectPropertiesResultView {
            type_check_result: self.type_check_result(),
            brief: self.brief(),
            type_name: self.type_name(),
            properties: self.properties().iter().map(ObjectProperty::public_view).collect(),
        }
    }
}

/// プロパティのABIレコード
///
/// 文字列はNUL終端で、所有するプロジェクションが解放されるまで有効です。
#[repr(C)]
#[derive(Debug)]
pub struct RawObjectProperty {
    pub name: *const c_char,
    pub type_name: *const c_char,
    pub decompressed_type: *const c_char,
    pub address: u64,
    pub num_values: u64,
    pub kind: PropertyKind,
    /// `MemoryAccessResult::code()`
    pub validity: u8,
}

/// 解析結果のABIレコード
///
/// `handle` は解放時に所有者を探すための逆参照です。
#[repr(C)]
#[derive(Debug)]
pub struct RawObjectPropertiesResult {
    pub type_check_result: TypeCheckResult,
    pub brief: *const c_char,
    pub type_name: *const c_char,
    pub num_properties: u64,
    /// プロパティがなければNULL
    pub properties: *const *const RawObjectProperty,
    pub handle: u64,
}

/// 1リクエスト分の所有データとABIレコード
///
/// レコードが指す先はすべてこの構造体が所有するヒープ領域です。
/// 構築後は変更しないため、ポインタは構造体が破棄されるまで有効です。
#[derive(Debug)]
pub struct Projection {
    result: ObjectPropertiesResult,
    _strings: Vec<CString>,
    _properties: Vec<RawObjectProperty>,
    _property_ptrs: Vec<*const RawObjectProperty>,
    raw: RawObjectPropertiesResult,
}

/// NUL終端文字列に変換して保持し、そのポインタを返す
fn intern(strings: &mut Vec<CString>, s: &str) -> *const c_char {
    // 途中のNULはエスケープしてから変換するので失敗しない
    let cstring = CString::new(s.replace('\0', "\\0")).unwrap_or_default();
    let ptr = cstring.as_ptr();
    strings.push(cstring);
    ptr
}

impl Projection {
    /// 結果を所有してABIレコードを構築する
    pub fn new(result: ObjectPropertiesResult, handle: u64) -> Self {
        let mut strings = Vec::new();

        let properties: Vec<RawObjectProperty> = result
            .properties()
            .iter()
            .map(|property| RawObjectProperty {
                name: intern(&mut strings, property.name()),
                type_name: intern(&mut strings, property.type_name()),
                decompressed_type: intern(&mut strings, property.decompressed_type()),
                address: property.address(),
                num_values: property.num_values(),
                kind: property.kind(),
                validity: property.validity().code(),
            })
            .collect();
        let property_ptrs: Vec<*const RawObjectProperty> =
            properties.iter().map(|p| p as *const RawObjectProperty).collect();

        let raw = RawObjectPropertiesResult {
            type_check_result: result.type_check_result(),
            brief: intern(&mut strings, result.brief()),
            type_name: intern(&mut strings, result.type_name()),
            num_properties: property_ptrs.len() as u64,
            properties: if property_ptrs.is_empty() {
                std::ptr::null()
            } else {
                property_ptrs.as_ptr()
            },
            handle,
        };

        Self {
            result,
            _strings: strings,
            _properties: properties,
            _property_ptrs: property_ptrs,
            raw,
        }
    }

    pub fn raw(&self) -> &RawObjectPropertiesResult {
        &self.raw
    }

    pub fn result(&self) -> &ObjectPropertiesResult {
        &self.result
    }

    pub fn into_result(self) -> ObjectPropertiesResult {
        self.result
    }
}

/// 公開ビューのハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewHandle(u64);

impl ViewHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl From<&RawObjectPropertiesResult> for ViewHandle {
    fn from(raw: &RawObjectPropertiesResult) -> Self {
        Self(raw.handle)
    }
}

impl std::fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// リクエストごとのプロジェクションを保持するアリーナ
///
/// ハンドルは単調増加で再利用しないため、二重解放は `AlreadyReleased` として検出されます。
#[derive(Debug)]
pub struct ViewArena {
    next_id: u64,
    live: HashMap<u64, Box<Projection>>,
}

impl ViewArena {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            live: HashMap::new(),
        }
    }

    /// 結果の所有権を受け取り、公開ビューを発行する
    pub fn publish(&mut self, result: ObjectPropertiesResult) -> ViewHandle {
        let id = self.next_id;
        self.next_id += 1;
        debug!(
            "Publishing view #{} ({} properties)",
            id,
            result.properties().len()
        );
        self.live.insert(id, Box::new(Projection::new(result, id)));
        ViewHandle(id)
    }

    fn missing(&self, id: u64) -> ViewError {
        if id != 0 && id < self.next_id {
            ViewError::AlreadyReleased(id)
        } else {
            ViewError::UnknownHandle(id)
        }
    }

    fn projection(&self, handle: ViewHandle) -> Result<&Projection, ViewError> {
        self.live
            .get(&handle.0)
            .map(|projection| projection.as_ref())
            .ok_or_else(|| self.missing(handle.0))
    }

    /// ABIレコードを取得する
    pub fn raw(&self, handle: ViewHandle) -> Result<&RawObjectPropertiesResult, ViewError> {
        self.projection(handle).map(Projection::raw)
    }

    /// 所有している結果を取得する
    pub fn result(&self, handle: ViewHandle) -> Result<&ObjectPropertiesResult, ViewError> {
        self.projection(handle).map(Projection::result)
    }

    /// 結果と、そのすべてのプロパティ・文字列を解放する
    pub fn release(&mut self, handle: ViewHandle) -> Result<(), ViewError> {
        match self.live.remove(&handle.0) {
            Some(_) => {
                debug!("Released view {}", handle);
                Ok(())
            }
            None => Err(self.missing(handle.0)),
        }
    }

    /// 解放せずに結果の所有権を取り戻す
    pub fn take(&mut self, handle: ViewHandle) -> Result<ObjectPropertiesResult, ViewError> {
        match self.live.remove(&handle.0) {
            Some(projection) => Ok(projection.into_result()),
            None => Err(self.missing(handle.0)),
        }
    }

    /// 生存しているハンドル（発行順）
    pub fn handles(&self) -> Vec<ViewHandle> {
        let mut handles: Vec<ViewHandle> = self.live.keys().copied().map(ViewHandle).collect();
        handles.sort();
        handles
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

impl Default for ViewArena {
    fn default() -> Self {
        Self::new()
    }
}
