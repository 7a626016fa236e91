//! 解析設定

use crate::compression::PointerCompression;
use crate::object::ObjectKind;
use std::collections::HashMap;

/// インスタンス型からオブジェクト種別への対応表
///
/// 対応表そのものはホスト側（デバッグ対象のビルド）が提供します。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceTypeTable {
    kinds: HashMap<u16, ObjectKind>,
}

impl InstanceTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance_type: u16, kind: ObjectKind) {
        self.kinds.insert(instance_type, kind);
    }

    pub fn get(&self, instance_type: u16) -> Option<ObjectKind> {
        self.kinds.get(&instance_type).copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl FromIterator<(u16, ObjectKind)> for InstanceTypeTable {
    fn from_iter<I: IntoIterator<Item = (u16, ObjectKind)>>(iter: I) -> Self {
        Self {
            kinds: iter.into_iter().collect(),
        }
    }
}

/// 解析設定
#[derive(Debug, Clone)]
pub struct InspectConfig {
    /// ポインタ圧縮
    pub compression: PointerCompression,
    /// インスタンス型の対応表
    pub instance_types: InstanceTypeTable,
    /// 「移動済み」リダイレクトを辿る最大回数
    pub max_forwarding_hops: usize,
    /// 文字列の説明に読み込む最大文字数
    pub max_string_chars: usize,
    /// マップ内のインスタンス型のオフセット（Noneならタグ付き値1つ + 4バイト）
    pub map_instance_type_offset: Option<u64>,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            compression: PointerCompression::default(),
            instance_types: InstanceTypeTable::new(),
            max_forwarding_hops: 4,
            max_string_chars: 256,
            map_instance_type_offset: None,
        }
    }
}

impl InspectConfig {
    /// マップ内でインスタンス型（u16）が置かれているオフセット
    pub fn instance_type_offset(&self) -> u64 {
        self.map_instance_type_offset
            .unwrap_or(self.compression.tagged_size() + 4)
    }
}
