//! プロセス制御機能

use crate::memory::ProcessMemory;
use crate::Result;
use nix::sys::ptrace;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// 解析対象のプロセス
///
/// アタッチしている間はプロセスが停止しているため、ヒープの内容が途中で変わりません。
/// 破棄されるとデタッチしてプロセスを再開させます。
pub struct Process {
    pid: Pid,
}

impl Process {
    /// 既存のプロセスにアタッチし、停止するまで待機する
    pub fn attach(pid: i32) -> Result<Self> {
        let pid = Pid::from_raw(pid);
        ptrace::attach(pid)
            .map_err(|e| anyhow::anyhow!("Failed to attach to pid {}: {}", pid, e))?;

        match waitpid(pid, None)? {
            WaitStatus::Stopped(_, signal) => {
                debug!("Attached to pid {} (stopped by {:?})", pid, signal);
                Ok(Self { pid })
            }
            status => {
                let _ = ptrace::detach(pid, None);
                Err(anyhow::anyhow!(
                    "Unexpected wait status after attach: {:?}",
                    status
                ))
            }
        }
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// このプロセスのメモリアクセスを作成する
    pub fn memory(&self) -> ProcessMemory {
        ProcessMemory::new(self.pid())
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if let Err(e) = ptrace::detach(self.pid, None) {
            warn!("Failed to detach from pid {}: {}", self.pid, e);
        }
    }
}
