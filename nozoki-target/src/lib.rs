//! Nozoki ターゲットプロセスへのアクセス
//!
//! このクレートは、稼働中のプロセスをインスペクタから読むための低レベル機能を提供します。
//! ptraceによるアタッチと、/proc/pid/mem を使ったメモリアクセスを行います。

pub mod memory;
pub mod process;

pub use memory::{parse_maps, MemoryMapping, ProcessMemory};
pub use process::Process;

/// ターゲットアクセスの結果型
pub type Result<T> = anyhow::Result<T>;
