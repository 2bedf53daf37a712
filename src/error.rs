//! 에러 타입 정의

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// 프레임 디코딩 에러 (연결 단위로 치명적)
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("필드 잘림: {field} expected {expected} bytes, got {got}")]
    Truncated {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("파일 이름이 너무 김: {len} bytes (최대 {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("유효하지 않은 파일 이름: {0:?}")]
    InvalidFilename(String),

    #[error("알 수 없는 ACK 토큰: {0:?}")]
    UnknownAck(Vec<u8>),
}

/// 로컬 파일 에러 (단일 작업 단위로 치명적)
#[derive(Error, Debug)]
pub enum FileError {
    #[error("파일 없음: {0}")]
    NotFound(PathBuf),

    #[error("UTF-8이 아닌 파일 이름은 전송 불가: {0:?}")]
    NonUtf8Name(PathBuf),

    #[error("파일 읽기 불가: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("파일 생성 실패: {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("파일 쓰기 실패: {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("전송 중 파일 크기 감소: {path}: declared {declared} bytes, sent {sent}")]
    Shrunk {
        path: PathBuf,
        declared: u64,
        sent: u64,
    },
}

/// TFP 전송 에러 타입
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("연결 실패: {addr}: {source}")]
    Connection {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("바인드 실패: {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("프로토콜 에러: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("파일 에러: {0}")]
    File(#[from] FileError),

    #[error("서버가 전송을 거부함 (all bad)")]
    Rejected,

    #[error("ACK 수신 전 연결 종료")]
    NoAck,

    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, TransferError>;
