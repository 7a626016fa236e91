//! エラー型

use thiserror::Error;

/// 公開ビューのハンドル操作のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ViewError {
    /// このアリーナが発行していないハンドル
    #[error("Unknown view handle {0}")]
    UnknownHandle(u64),

    /// 解放済みのハンドル
    #[error("View handle {0} was already released")]
    AlreadyReleased(u64),
}

/// 組み込みのオブジェクト種別に無い型名
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown object kind: {0}")]
pub struct ObjectKindError(pub String);
