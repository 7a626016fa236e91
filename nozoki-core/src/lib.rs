//! Nozoki ヒープインスペクタのコア機能
//!
//! このクレートは、停止中またはポストモーテムのプロセスイメージから
//! V8形式のタグ付きヒープオブジェクトを解析する中核ロジックを提供します。
//! メモリアクセスは `MemoryAccessor` としてホストから注入され、
//! 読み取りの失敗はすべて結果のデータとして報告されます。

pub mod access;
pub mod command;
pub mod compression;
pub mod config;
pub mod describe;
pub mod errors;
pub mod inspector;
pub mod object;
pub mod objects;
pub mod parse;
pub mod property;
pub mod result;
pub mod snapshot;
pub mod view;

pub use access::{read_value, MemoryAccessResult, MemoryAccessor, MemoryReadable, Value};
pub use command::Command;
pub use compression::PointerCompression;
pub use config::{InspectConfig, InstanceTypeTable};
pub use describe::{describe_object, ObjectRequest, PointerForm};
pub use errors::{ObjectKindError, ViewError};
pub use inspector::Inspector;
pub use object::{ObjectKind, ReadContext, TqObject, TqObjectVisitor};
pub use property::{get_array_kind, ObjectProperty, PropertyKind};
pub use result::{ObjectPropertiesResult, TypeCheckResult};
pub use snapshot::SnapshotMemory;
pub use view::{
    ObjectPropertiesResultView, ObjectPropertyView, RawObjectPropertiesResult, RawObjectProperty,
    ViewArena, ViewHandle,
};

/// インスペクタの結果型
pub type Result<T> = anyhow::Result<T>;
