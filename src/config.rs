//! 프로토콜 설정

use std::path::PathBuf;
use std::time::Duration;

use crate::{DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_INTERVAL_SECS, DEFAULT_UPLOADS_DIR, MAX_FILENAME_LEN};

/// TFP 설정 (클라이언트/서버 공용)
#[derive(Debug, Clone)]
pub struct Config {
    /// 송수신 청크 크기 (바이트)
    /// 와이어 포맷에는 영향 없음
    pub buffer_size: usize,

    /// 처리율 샘플링 주기
    pub sample_interval: Duration,

    /// 수신 파일 저장 디렉터리
    pub uploads_dir: PathBuf,

    /// 허용하는 파일 이름 최대 길이
    pub max_filename_len: usize,

    /// 동시 처리 연결 수 상한
    /// None이면 제한 없음 (연결마다 태스크 하나)
    pub max_connections: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            sample_interval: Duration::from_secs(DEFAULT_SAMPLE_INTERVAL_SECS),
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
            max_filename_len: MAX_FILENAME_LEN,
            max_connections: None,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장 디렉터리 지정
    pub fn with_uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_dir = dir.into();
        self
    }

    /// 동시 연결 상한 지정
    pub fn with_max_connections(mut self, limit: usize) -> Self {
        self.max_connections = Some(limit.max(1));
        self
    }

    /// 0 크기 버퍼 방지
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(1)
    }

    /// 저사양 기기용 설정
    pub fn low_spec() -> Self {
        Self {
            buffer_size: 8 * 1024,            // 8KB
            max_connections: Some(16),
            ..Self::default()
        }
    }

    /// 고성능 기기용 설정
    pub fn high_performance() -> Self {
        Self {
            buffer_size: 1024 * 1024,         // 1MB
            ..Self::default()
        }
    }
}
