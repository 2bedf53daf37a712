//! 서버 연결 핸들러
//!
//! 연결 하나에서 파일 하나를 수신:
//! 헤더 수신 → 페이로드 수신 → ACK 전송 → 종료.
//! IO 실패 시 어느 단계에서든 바로 종료

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::codec::{staging_name, storage_name, Ack, FrameHeader};
use crate::error::FileError;
use crate::session::{SessionOutcome, TransferSession};
use crate::Config;

/// 연결 하나를 끝까지 처리하고 결과 반환
///
/// 헤더가 잘리거나 이름이 유효하지 않으면 `ConnectionError`, 저장 파일을 만들 수 없으면
/// `IoError`로 ACK 없이 종료. 그 외에는 수신 바이트 수에 따라 ACK 전송
pub async fn handle_connection<S>(mut stream: S, client_sequence: u64, config: &Config) -> SessionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let seq = client_sequence;
    debug!(client = seq, "*** new connection ***");

    let header = match FrameHeader::read_from(&mut stream, config.max_filename_len).await {
        Ok(header) => header,
        Err(e) => {
            warn!(client = seq, "헤더 수신 실패: {}", e);
            return SessionOutcome::ConnectionError;
        }
    };

    let name = match storage_name(&header.filename) {
        Ok(name) => name,
        Err(e) => {
            warn!(client = seq, "파일 이름 거부: {}", e);
            return SessionOutcome::ConnectionError;
        }
    };

    info!(client = seq, "received filename: {}", name);
    info!(client = seq, "received file size: {}", header.file_size);

    let dest = config.uploads_dir.join(&name);
    let staging = staging_path(&config.uploads_dir, seq);

    let mut file = match File::create(&staging).await {
        Ok(file) => file,
        Err(source) => {
            let err = FileError::Create { path: dest, source };
            warn!(client = seq, "{}", err);
            return SessionOutcome::IoError;
        }
    };

    let mut session = TransferSession::new(seq, header.file_size, config.sample_interval);
    let failure = receive_payload(&mut stream, &mut file, &mut session, config).await;

    let persisted = persist(file, &staging, &dest).await;
    if let Err(e) = &persisted {
        warn!(client = seq, "{}", e);
    }

    let outcome = match (failure, persisted) {
        (Some(outcome), _) => {
            session.fail(outcome);
            outcome
        }
        (None, Err(_)) => {
            session.fail(SessionOutcome::IoError);
            SessionOutcome::IoError
        }
        (None, Ok(())) => session.finish(),
    };

    info!(
        client = seq,
        "speed: {:.2} KB/s, outcome: {}",
        session.average_throughput() / 1024.0,
        outcome
    );
    info!(client = seq, "{}", session.summary());

    if outcome == SessionOutcome::ConnectionError {
        return outcome;
    }

    let ack = Ack::from_outcome(outcome.is_success());
    if let Err(e) = send_ack(&mut stream, ack).await {
        warn!(client = seq, "ACK 전송 실패: {}", e);
    } else {
        debug!(client = seq, "ack sent: {}", ack);
    }

    outcome
}

/// 선언된 크기만큼 페이로드 수신
///
/// 정상 종료(완료 또는 조기 EOF)면 None, 실패 시 실패 결과 반환
async fn receive_payload<S>(
    stream: &mut S,
    file: &mut File,
    session: &mut TransferSession,
    config: &Config,
) -> Option<SessionOutcome>
where
    S: AsyncRead + Unpin,
{
    let seq = session.client_sequence;
    let mut buf = vec![0u8; config.effective_buffer_size()];

    while !session.is_complete() {
        let want = session.next_chunk_len(buf.len());
        let n = match stream.read(&mut buf[..want]).await {
            Ok(0) => {
                warn!(
                    client = seq,
                    "연결 조기 종료: {}/{} bytes",
                    session.bytes_transferred(),
                    session.declared_size
                );
                return None;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(client = seq, "수신 에러: {}", e);
                return Some(SessionOutcome::ConnectionError);
            }
        };

        if let Err(e) = file.write_all(&buf[..n]).await {
            warn!(client = seq, "파일 쓰기 실패: {}", e);
            return Some(SessionOutcome::IoError);
        }

        if let Some(sample) = session.record(&buf[..n]) {
            info!(
                client = seq,
                "instant speed: {:.2} KB/s, average speed: {:.2} KB/s",
                sample.instant_kib_per_sec(),
                sample.average_kib_per_sec()
            );
        }
    }

    None
}

/// 스테이징 파일을 닫고 최종 이름으로 교체
///
/// 같은 이름의 동시 업로드는 rename 순서대로 마지막 것이 남음
async fn persist(mut file: File, staging: &Path, dest: &Path) -> Result<(), FileError> {
    let flushed = file.flush().await;
    drop(file);
    flushed.map_err(|source| FileError::Write {
        path: staging.to_path_buf(),
        source,
    })?;

    tokio::fs::rename(staging, dest)
        .await
        .map_err(|source| FileError::Write {
            path: dest.to_path_buf(),
            source,
        })
}

async fn send_ack<S>(stream: &mut S, ack: Ack) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&ack.to_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}

fn staging_path(dir: &Path, client_sequence: u64) -> PathBuf {
    dir.join(staging_name(client_sequence))
}
