//! REPLコマンド

/// REPLコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// オブジェクトを解析（アドレス文字列と型ヒント）
    Inspect {
        address: String,
        type_hint: Option<String>,
    },
    /// 生存しているビュー一覧
    Views,
    /// ビューを解放
    Release(u64),
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

impl Command {
    /// コマンド文字列をパースする
    pub fn parse(input: &str) -> Option<Self> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return None;
        }

        match parts[0] {
            "inspect" | "i" | "p" => {
                let address = parts.get(1)?;
                Some(Command::Inspect {
                    address: address.to_string(),
                    type_hint: parts.get(2).map(|s| s.to_string()),
                })
            }
            "views" | "v" => Some(Command::Views),
            "release" | "r" => {
                let id = parts.get(1)?.trim_start_matches('#');
                id.parse().ok().map(Command::Release)
            }
            "help" | "h" | "?" => Some(Command::Help),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}
