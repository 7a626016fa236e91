//! オブジェクト解析結果

use crate::property::ObjectProperty;

/// 実行時の型タグが想定した型を裏付けたかどうか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeCheckResult {
    /// 値はSmi（ヒープオブジェクトではない）
    Smi = 0,
    /// マップから型を決定した
    UsedMap = 1,
    /// マップが読めなかったため型ヒントを使った
    UsedTypeHint = 2,
    /// マップの型が型ヒントと矛盾した（マップを優先）
    TypeHintMismatch = 3,
    /// 圧縮ポインタを展開できなかった
    UnableToDecompress = 4,
    /// オブジェクトのアドレスが無効
    ObjectPointerInvalid = 5,
    /// オブジェクトのアドレスは有効だが読めない
    ObjectPointerValidButInaccessible = 6,
    /// マップのアドレスが無効
    MapPointerInvalid = 7,
    /// マップのアドレスは有効だが読めない
    MapPointerValidButInaccessible = 8,
    /// インスタンス型が表に無い
    UnknownInstanceType = 9,
    /// 型ヒントが既知の型ではない
    UnknownTypeHint = 10,
}

impl TypeCheckResult {
    /// 型が実行時タグで裏付けられたか
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TypeCheckResult::Smi | TypeCheckResult::UsedMap)
    }

    /// 型チェック自体ができなかったか
    pub fn is_unchecked(&self) -> bool {
        !self.is_confirmed() && !matches!(self, TypeCheckResult::TypeHintMismatch)
    }
}

impl std::fmt::Display for TypeCheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let text = match self {
            TypeCheckResult::Smi => "smi",
            TypeCheckResult::UsedMap => "used map",
            TypeCheckResult::UsedTypeHint => "used type hint",
            TypeCheckResult::TypeHintMismatch => "map contradicts type hint",
            TypeCheckResult::UnableToDecompress => "unable to decompress",
            TypeCheckResult::ObjectPointerInvalid => "object pointer invalid",
            TypeCheckResult::ObjectPointerValidButInaccessible => {
                "object pointer valid but inaccessible"
            }
            TypeCheckResult::MapPointerInvalid => "map pointer invalid",
            TypeCheckResult::MapPointerValidButInaccessible => "map pointer valid but inaccessible",
            TypeCheckResult::UnknownInstanceType => "unknown instance type",
            TypeCheckResult::UnknownTypeHint => "unknown type hint",
        };
        f.write_str(text)
    }
}

/// 1つのオブジェクトを解析した結果
///
/// プロパティは宣言順に保持し、その順序は公開ビューでも保たれます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPropertiesResult {
    type_check_result: TypeCheckResult,
    brief: String,
    type_name: String,
    properties: Vec<ObjectProperty>,
}

impl ObjectPropertiesResult {
    pub fn new(
        type_check_result: TypeCheckResult,
        brief: impl Into<String>,
        type_name: impl Into<String>,
        properties: Vec<ObjectProperty>,
    ) -> Self {
        Self {
            type_check_result,
            brief: brief.into(),
            type_name: type_name.into(),
            properties,
        }
    }

    /// 説明文の先頭に文字列を付け加える
    ///
    /// 例: `"weak ref to " + 内側の説明`
    pub fn prepend(&mut self, prefix: &str) {
        self.brief.insert_str(0, prefix);
    }

    pub fn type_check_result(&self) -> TypeCheckResult {
        self.type_check_result
    }

    pub fn brief(&self) -> &str {
        &self.brief
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &[ObjectProperty] {
        &self.properties
    }

    pub fn into_properties(self) -> Vec<ObjectProperty> {
        self.properties
    }
}

impl std::fmt::Display for ObjectPropertiesResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "{}", self.brief)?;
        write!(f, "  type: {} ({})", self.type_name, self.type_check_result)?;
        for property in &self.properties {
            write!(f, "\n  {}", property)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ObjectPropertiesResult {
        ObjectPropertiesResult::new(
            TypeCheckResult::UsedMap,
            "0x1001 <FixedArray>",
            "FixedArray",
            vec![
                ObjectProperty::new("map", "TaggedValue", "Map", 0x1000),
                ObjectProperty::new("length", "TaggedValue", "Smi", 0x1004),
            ],
        )
    }

    #[test]
    fn test_prepend_only_changes_brief() {
        let original = sample();
        let mut result = original.clone();
        result.prepend("weak ref to ");

        assert_eq!(result.brief(), "weak ref to 0x1001 <FixedArray>");
        assert_eq!(result.type_name(), original.type_name());
        assert_eq!(result.type_check_result(), original.type_check_result());
        assert_eq!(result.properties(), original.properties());
    }

    #[test]
    fn test_empty_properties_with_unchecked_type() {
        let result =
            ObjectPropertiesResult::new(TypeCheckResult::UnknownTypeHint, "", "Object", Vec::new());
        assert!(result.properties().is_empty());
        assert!(result.type_check_result().is_unchecked());
    }

    #[test]
    fn test_display() {
        let text = sample().to_string();
        assert!(text.starts_with("0x1001 <FixedArray>\n  type: FixedArray (used map)"));
        assert!(text.contains("\n  map: Map (as TaggedValue) @ 0x1000"));
    }
}
