//! 전송 세션
//!
//! 연결 하나당 세션 하나. 소유자(서버 핸들러 또는 클라이언트 송신 경로)만 변경하며
//! 태스크 간에 공유되지 않음

use std::fmt;
use std::time::{Duration, Instant};

use crate::stats::{ThroughputMeter, ThroughputSample};

/// 세션 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    InProgress,
    Success,
    SizeMismatch,
    IoError,
    ConnectionError,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Success)
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionOutcome::InProgress => "in_progress",
            SessionOutcome::Success => "success",
            SessionOutcome::SizeMismatch => "size_mismatch",
            SessionOutcome::IoError => "io_error",
            SessionOutcome::ConnectionError => "connection_error",
        };
        f.write_str(s)
    }
}

/// 전송 세션 상태
#[derive(Clone)]
pub struct TransferSession {
    /// 수락 순번 (로그 표기용, 프로토콜에는 노출 안 됨)
    pub client_sequence: u64,

    /// 프레임의 file_size
    pub declared_size: u64,

    /// 처리율 측정기 (start_time, last_sample_time 보유)
    meter: ThroughputMeter,

    /// 페이로드 CRC32 (로그 비교용)
    hasher: crc32fast::Hasher,

    outcome: SessionOutcome,
}

impl TransferSession {
    pub fn new(client_sequence: u64, declared_size: u64, sample_interval: Duration) -> Self {
        Self {
            client_sequence,
            declared_size,
            meter: ThroughputMeter::new(sample_interval),
            hasher: crc32fast::Hasher::new(),
            outcome: SessionOutcome::InProgress,
        }
    }

    /// 페이로드 조각 기록
    ///
    /// 샘플링 주기가 지났으면 처리율 샘플 반환
    pub fn record(&mut self, chunk: &[u8]) -> Option<ThroughputSample> {
        self.hasher.update(chunk);
        self.meter.record(chunk.len() as u64)
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.meter.total_bytes
    }

    /// 남은 페이로드 바이트
    pub fn remaining(&self) -> u64 {
        self.declared_size.saturating_sub(self.bytes_transferred())
    }

    /// 다음 읽기/쓰기 크기 (선언된 크기를 넘지 않음)
    pub fn next_chunk_len(&self, buffer_size: usize) -> usize {
        self.remaining().min(buffer_size as u64) as usize
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_transferred() == self.declared_size
    }

    pub fn start_time(&self) -> Instant {
        self.meter.start_time
    }

    pub fn last_sample_time(&self) -> Instant {
        self.meter.last_sample_time
    }

    pub fn elapsed(&self) -> Duration {
        self.meter.elapsed()
    }

    pub fn average_throughput(&self) -> f64 {
        self.meter.overall_throughput()
    }

    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn outcome(&self) -> SessionOutcome {
        self.outcome
    }

    /// 수신 종료 시 결과 결정: 크기 일치면 Success, 아니면 SizeMismatch
    pub fn finish(&mut self) -> SessionOutcome {
        self.outcome = if self.is_complete() {
            SessionOutcome::Success
        } else {
            SessionOutcome::SizeMismatch
        };
        self.outcome
    }

    /// IO/연결 실패로 종료
    pub fn fail(&mut self, outcome: SessionOutcome) {
        self.outcome = outcome;
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "{} | {}/{} bytes | crc32={:08x}",
            self.meter.summary(),
            self.bytes_transferred(),
            self.declared_size,
            self.checksum(),
        )
    }
}

impl fmt::Debug for TransferSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSession")
            .field("client_sequence", &self.client_sequence)
            .field("declared_size", &self.declared_size)
            .field("bytes_transferred", &self.bytes_transferred())
            .field("outcome", &self.outcome)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_is_complete() {
        let mut session = TransferSession::new(0, 0, Duration::from_secs(3));

        assert!(session.is_complete());
        assert_eq!(session.next_chunk_len(1024), 0);
        assert_eq!(session.finish(), SessionOutcome::Success);
    }

    #[test]
    fn test_chunk_len_bounded_by_declared_size() {
        let mut session = TransferSession::new(1, 2500, Duration::from_secs(3));

        assert_eq!(session.next_chunk_len(1024), 1024);
        session.record(&[0u8; 1024]);
        session.record(&[0u8; 1024]);
        assert_eq!(session.next_chunk_len(1024), 452);
        session.record(&[0u8; 452]);

        assert_eq!(session.remaining(), 0);
        assert_eq!(session.next_chunk_len(1024), 0);
        assert_eq!(session.finish(), SessionOutcome::Success);
    }

    #[test]
    fn test_short_transfer_is_mismatch() {
        let mut session = TransferSession::new(2, 100, Duration::from_secs(3));
        session.record(&[1u8; 40]);

        assert_eq!(session.outcome(), SessionOutcome::InProgress);
        assert_eq!(session.finish(), SessionOutcome::SizeMismatch);
        assert!(!session.outcome().is_success());
    }

    #[test]
    fn test_checksum_independent_of_chunking() {
        let data: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();

        let mut whole = TransferSession::new(0, data.len() as u64, Duration::from_secs(3));
        whole.record(&data);

        let mut pieces = TransferSession::new(0, data.len() as u64, Duration::from_secs(3));
        for chunk in data.chunks(333) {
            pieces.record(chunk);
        }

        assert_eq!(whole.checksum(), crc32fast::hash(&data));
        assert_eq!(pieces.checksum(), whole.checksum());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(SessionOutcome::SizeMismatch.to_string(), "size_mismatch");
        assert_eq!(SessionOutcome::ConnectionError.to_string(), "connection_error");
    }
}
