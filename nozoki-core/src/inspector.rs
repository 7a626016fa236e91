//! インスペクタのメインロジック

use crate::access::MemoryAccessor;
use crate::config::InspectConfig;
use crate::describe::{describe_object, ObjectRequest};
use crate::errors::ViewError;
use crate::result::ObjectPropertiesResult;
use crate::view::{RawObjectPropertiesResult, ViewArena, ViewHandle};
use tracing::debug;

/// インスペクタ
///
/// メモリアクセス・設定・公開ビューのアリーナをまとめたもので、
/// ホストはこれを通してオブジェクトの解析と結果の解放を行います。
pub struct Inspector<A: MemoryAccessor> {
    /// メモリアクセス
    accessor: A,
    /// 解析設定
    config: InspectConfig,
    /// 発行済みビュー
    views: ViewArena,
}

impl<A: MemoryAccessor> Inspector<A> {
    /// 新しいインスペクタを作成する
    pub fn new(accessor: A, config: InspectConfig) -> Self {
        Self {
            accessor,
            config,
            views: ViewArena::new(),
        }
    }

    /// オブジェクトを解析し、公開ビューを発行する
    ///
    /// 返したハンドルは `release` で解放するまで有効です。
    pub fn describe(&mut self, request: &ObjectRequest) -> ViewHandle {
        let result = self.describe_result(request);
        let handle = self.views.publish(result);
        debug!("Described 0x{:x} as view {}", request.address, handle);
        handle
    }

    /// ビューを発行せずに解析結果を返す
    pub fn describe_result(&self, request: &ObjectRequest) -> ObjectPropertiesResult {
        describe_object(request, &self.accessor, &self.config)
    }

    /// ABIレコードを取得する
    pub fn raw_view(&self, handle: ViewHandle) -> Result<&RawObjectPropertiesResult, ViewError> {
        self.views.raw(handle)
    }

    /// 解析結果を取得する
    pub fn result(&self, handle: ViewHandle) -> Result<&ObjectPropertiesResult, ViewError> {
        self.views.result(handle)
    }

    /// 解析結果とそのプロパティをすべて解放する
    pub fn release(&mut self, handle: ViewHandle) -> Result<(), ViewError> {
        self.views.release(handle)
    }

    /// 生存しているビューのハンドル
    pub fn live_views(&self) -> Vec<ViewHandle> {
        self.views.handles()
    }

    pub fn config(&self) -> &InspectConfig {
        &self.config
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }
}
