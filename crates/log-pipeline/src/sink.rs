//! 출력 싱크
//!
//! - [`ScreenSink`]: 표준 출력
//! - [`RotatingFileSink`]: `<prefix>.log`에 추가 기록하고 기준 크기를 넘으면 로테이션
//! - [`MemorySink`]: 기록한 줄을 보관 (리플레이와 테스트용)
//!
//! 로테이션은 현재 파일을 `<prefix>-YYYY-MM-DD_hhmmss.log`로 복사한 뒤 현재 파일을
//! 비웁니다. 같은 초에 이미 복사본이 있으면 `_1`, `_2`... 접미어를 붙입니다.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tracing::{debug, info};

use loggrabber_core::error::SinkError;
use loggrabber_core::pipeline::LogSink;

/// 로테이션 복사본 시각 형식
pub const ROTATION_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// 표준 출력 싱크
#[derive(Debug, Default)]
pub struct ScreenSink {
    _private: (),
}

impl ScreenSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for ScreenSink {
    fn name(&self) -> &str {
        "screen"
    }

    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        let mut out = io::stdout().lock();
        writeln!(out, "{line}").map_err(|e| SinkError::Write(e.to_string()))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        io::stdout()
            .flush()
            .map_err(|e| SinkError::Write(e.to_string()))
    }
}

/// 크기 기준 로테이션 파일 싱크
pub struct RotatingFileSink {
    prefix: String,
    path: PathBuf,
    rotate_size: u64,
    writer: BufWriter<File>,
    written: u64,
    clock: fn() -> DateTime<Local>,
}

impl std::fmt::Debug for RotatingFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFileSink")
            .field("path", &self.path)
            .field("rotate_size", &self.rotate_size)
            .field("written", &self.written)
            .finish()
    }
}

impl RotatingFileSink {
    /// `<prefix>.log`를 추가 모드로 엽니다.
    pub fn open(prefix: impl Into<String>, rotate_size: u64) -> Result<Self, SinkError> {
        let prefix = prefix.into();
        let path = PathBuf::from(format!("{prefix}.log"));
        let file = open_append(&path)?;
        let written = file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| open_error(&path, e))?;

        info!(path = %path.display(), rotate_size, "output file opened");
        Ok(Self {
            prefix,
            path,
            rotate_size,
            writer: BufWriter::new(file),
            written,
            clock: Local::now,
        })
    }

    /// 복사본 이름에 사용할 시계를 바꿉니다.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    /// 현재 출력 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 다음 로테이션 복사본 경로를 고릅니다.
    fn rotation_target(&self) -> PathBuf {
        let stamp = (self.clock)().format(ROTATION_TIMESTAMP_FORMAT).to_string();
        let plain = PathBuf::from(format!("{}-{stamp}.log", self.prefix));
        if !plain.exists() {
            return plain;
        }
        (1u32..)
            .map(|i| PathBuf::from(format!("{}-{stamp}_{i}.log", self.prefix)))
            .find(|candidate| !candidate.exists())
            .unwrap_or(plain)
    }

    fn rotate(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(|e| self.rotate_error(e))?;

        let target = self.rotation_target();
        std::fs::copy(&self.path, &target).map_err(|e| self.rotate_error(e))?;

        let file = File::create(&self.path).map_err(|e| self.rotate_error(e))?;
        self.writer = BufWriter::new(file);
        info!(
            path = %self.path.display(),
            rotated_to = %target.display(),
            size = self.written,
            "output file rotated"
        );
        self.written = 0;
        Ok(())
    }

    fn rotate_error(&self, e: io::Error) -> SinkError {
        SinkError::Rotate {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

impl LogSink for RotatingFileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        writeln!(self.writer, "{line}").map_err(|e| SinkError::Write(e.to_string()))?;
        self.written += line.len() as u64 + 1;

        if self.written > self.rotate_size {
            debug!(written = self.written, limit = self.rotate_size, "rotation size exceeded");
            self.rotate()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer
            .flush()
            .map_err(|e| SinkError::Write(e.to_string()))
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

fn open_append(path: &Path) -> Result<File, SinkError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| open_error(path, e))
}

fn open_error(path: &Path, e: io::Error) -> SinkError {
    SinkError::Open {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// 기록한 줄을 메모리에 보관하는 싱크
///
/// 복제본은 같은 버퍼를 공유하므로 싱크를 넘긴 뒤에도 결과를 확인할 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count`줄을 기록한 뒤부터 쓰기가 실패하는 싱크
    pub fn failing_after(count: usize) -> Self {
        Self {
            lines: Arc::default(),
            fail_after: Some(count),
        }
    }

    /// 지금까지 기록된 줄
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| SinkError::Write("memory sink poisoned".to_owned()))?;
        if self.fail_after.is_some_and(|limit| lines.len() >= limit) {
            return Err(SinkError::Write("memory sink is full".to_owned()));
        }
        lines.push(line.to_owned());
        Ok(())
    }
}
