//! 전송 통계
//!
//! 순간/평균 처리율 샘플링. 관측 전용이며 데이터 경로에는 영향 없음

use std::time::{Duration, Instant};

/// 한 번의 처리율 샘플
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSample {
    /// 직전 샘플 이후 처리율 (bytes/sec)
    pub instant_bps: f64,

    /// 세션 시작 이후 처리율 (bytes/sec)
    pub average_bps: f64,

    /// 직전 샘플 이후 바이트
    pub window_bytes: u64,

    /// 직전 샘플 이후 경과 시간
    pub window: Duration,

    /// 누적 바이트
    pub total_bytes: u64,
}

impl ThroughputSample {
    pub fn instant_kib_per_sec(&self) -> f64 {
        self.instant_bps / 1024.0
    }

    pub fn average_kib_per_sec(&self) -> f64 {
        self.average_bps / 1024.0
    }
}

/// 주기적 처리율 측정기
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    /// 시작 시간
    pub start_time: Instant,

    /// 마지막 샘플 시간
    pub last_sample_time: Instant,

    /// 누적 바이트
    pub total_bytes: u64,

    /// 마지막 샘플 이후 바이트
    bytes_since_sample: u64,

    /// 샘플링 주기
    interval: Duration,
}

impl ThroughputMeter {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub fn starting_at(now: Instant, interval: Duration) -> Self {
        Self {
            start_time: now,
            last_sample_time: now,
            total_bytes: 0,
            bytes_since_sample: 0,
            interval,
        }
    }

    /// 바이트 수신/송신 기록
    ///
    /// 주기가 지났으면 샘플을 반환하고 순간 카운터를 리셋
    pub fn record(&mut self, bytes: u64) -> Option<ThroughputSample> {
        self.record_at(bytes, Instant::now())
    }

    pub fn record_at(&mut self, bytes: u64, now: Instant) -> Option<ThroughputSample> {
        self.total_bytes += bytes;
        self.bytes_since_sample += bytes;

        let window = now.saturating_duration_since(self.last_sample_time);
        if window < self.interval || window.is_zero() {
            return None;
        }

        let total_elapsed = now.saturating_duration_since(self.start_time);
        let sample = ThroughputSample {
            instant_bps: rate(self.bytes_since_sample, window),
            average_bps: rate(self.total_bytes, total_elapsed),
            window_bytes: self.bytes_since_sample,
            window,
            total_bytes: self.total_bytes,
        };

        self.last_sample_time = now;
        self.bytes_since_sample = 0;
        Some(sample)
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 전체 처리율 (bytes/sec)
    pub fn overall_throughput(&self) -> f64 {
        rate(self.total_bytes, self.elapsed())
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Bytes: {} | Speed: {:.2} KB/s",
            self.elapsed().as_secs_f64(),
            self.total_bytes,
            self.overall_throughput() / 1024.0,
        )
    }
}

fn rate(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    bytes as f64 / secs
}
