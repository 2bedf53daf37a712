//! # TFP (TCP File Push)
//!
//! TCP 기반 단일 파일 업로드 프로토콜
//!
//! ## 핵심 특징
//! - **길이 접두 프레이밍**: `[u16 이름 길이][이름][u64 파일 크기][페이로드]`
//! - **네트워크 바이트 순서**: 모든 정수는 빅엔디안
//! - **연결당 태스크**: 서버는 연결마다 독립 태스크로 처리
//! - **ACK 토큰**: 수신 완료 후 `"all right"` / `"all bad"` 응답
//! - **처리율 측정**: 3초 주기 순간/평균 속도 로깅

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod sender;
pub mod server;
pub mod session;
pub mod stats;

pub use codec::{basename, storage_name, Ack, FrameHeader};
pub use config::Config;
pub use error::{FileError, ProtocolError, Result, TransferError};
pub use handler::handle_connection;
pub use sender::{send_file, wire_filename, FileSender, SendReport};
pub use server::{serve, serve_with_config, Server};
pub use session::{SessionOutcome, TransferSession};
pub use stats::{ThroughputMeter, ThroughputSample};

/// 파일 이름 최대 길이 (바이트)
pub const MAX_FILENAME_LEN: usize = 4096;

/// 기본 송수신 버퍼 크기 (바이트)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024; // 64KB

/// 기본 처리율 샘플링 주기 (초)
pub const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 3;

/// 기본 업로드 저장 디렉터리
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";
