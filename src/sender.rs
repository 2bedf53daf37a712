//! 송신자 (클라이언트측)
//!
//! - 연결 하나로 파일 하나 전송
//! - 헤더 → 페이로드 순서로 스트리밍
//! - ACK 토큰 대기

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::codec::{basename, Ack, FrameHeader, MAX_ACK_LEN};
use crate::error::FileError;
use crate::session::TransferSession;
use crate::{Config, Result, TransferError};

/// 전송 결과
#[derive(Debug, Clone)]
pub struct SendReport {
    /// 와이어에 실린 파일 이름 (basename)
    pub filename: String,

    /// 전송한 페이로드 바이트
    pub bytes_sent: u64,

    pub elapsed: Duration,

    /// 평균 처리율 (bytes/sec)
    pub average_bps: f64,

    /// 페이로드 CRC32
    pub checksum: u32,

    /// 서버 응답
    pub ack: Ack,
}

/// 파일 송신자
#[derive(Debug, Clone, Default)]
pub struct FileSender {
    config: Config,
}

impl FileSender {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 파일 하나를 전송하고 ACK까지 대기
    pub async fn send(&self, path: impl AsRef<Path>, server_addr: SocketAddr) -> Result<SendReport> {
        let path = path.as_ref();
        let filename = wire_filename(path)?;
        let (mut file, declared_size) = open_source(path).await?;
        let header = FrameHeader::new(filename.as_bytes(), declared_size).encode()?;

        let mut stream = TcpStream::connect(server_addr)
            .await
            .map_err(|source| TransferError::Connection {
                addr: server_addr,
                source,
            })?;

        info!("Connected to {}", server_addr);
        info!("Sending {} ({} bytes)", filename, declared_size);

        let mut session = TransferSession::new(0, declared_size, self.config.sample_interval);
        self.send_frame(&mut stream, &header, &mut file, &mut session, path)
            .await?;

        let ack = read_ack(&mut stream).await?;
        debug!("ack received: {}", ack);
        if ack == Ack::Failure {
            return Err(TransferError::Rejected);
        }

        info!("{}", session.summary());

        Ok(SendReport {
            filename,
            bytes_sent: session.bytes_transferred(),
            elapsed: session.elapsed(),
            average_bps: session.average_throughput(),
            checksum: session.checksum(),
            ack,
        })
    }

    async fn send_frame<S>(
        &self,
        stream: &mut S,
        header: &[u8],
        file: &mut File,
        session: &mut TransferSession,
        path: &Path,
    ) -> Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        stream.write_all(header).await.map_err(disconnected)?;

        let mut buf = vec![0u8; self.config.effective_buffer_size()];
        while !session.is_complete() {
            let want = session.next_chunk_len(buf.len());
            let n = file
                .read(&mut buf[..want])
                .await
                .map_err(|source| FileError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                })?;

            if n == 0 {
                return Err(FileError::Shrunk {
                    path: path.to_path_buf(),
                    declared: session.declared_size,
                    sent: session.bytes_transferred(),
                }
                .into());
            }

            stream.write_all(&buf[..n]).await.map_err(disconnected)?;

            if let Some(sample) = session.record(&buf[..n]) {
                let progress = session.bytes_transferred() as f64 / session.declared_size as f64;
                info!(
                    "Progress: {}/{} bytes ({:.1}%), {:.2} KB/s",
                    session.bytes_transferred(),
                    session.declared_size,
                    progress * 100.0,
                    sample.instant_kib_per_sec()
                );
            }
        }

        stream.flush().await.map_err(disconnected)
    }
}

/// 기본 설정으로 파일 전송
pub async fn send_file(path: impl AsRef<Path>, server_address: SocketAddr) -> Result<()> {
    FileSender::default().send(path, server_address).await?;
    Ok(())
}

/// 와이어에 실을 파일 이름 (경로의 basename)
///
/// 서버는 UTF-8 이름만 저장하므로 변환 불가능한 경로는 전송 전에 거부
pub fn wire_filename(path: &Path) -> std::result::Result<String, FileError> {
    path.to_str()
        .map(|s| basename(s).to_string())
        .ok_or_else(|| FileError::NonUtf8Name(path.to_path_buf()))
}

async fn open_source(path: &Path) -> Result<(File, u64)> {
    let unreadable = |source| FileError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FileError::NotFound(PathBuf::from(path)),
        _ => unreadable(e),
    })?;

    let meta = file.metadata().await.map_err(unreadable)?;
    if meta.is_dir() {
        return Err(unreadable(std::io::Error::new(
            std::io::ErrorKind::Other,
            "디렉터리는 전송할 수 없음",
        ))
        .into());
    }

    Ok((file, meta.len()))
}

/// ACK 토큰 수신. 토큰 없이 연결이 닫히면 `NoAck`
async fn read_ack<S>(stream: &mut S) -> Result<Ack>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(MAX_ACK_LEN);
    (&mut *stream)
        .take(MAX_ACK_LEN as u64)
        .read_to_end(&mut buf)
        .await
        .map_err(disconnected)?;

    if buf.is_empty() {
        return Err(TransferError::NoAck);
    }

    Ok(Ack::parse(&buf)?)
}

/// 연결 수립 이후의 소켓 실패는 ACK 미수신으로 취급
fn disconnected(e: std::io::Error) -> TransferError {
    debug!("연결 끊김: {}", e);
    TransferError::NoAck
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolError;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// 프레임을 그대로 읽고 reply를 보낸 뒤 연결을 닫는 테스트 서버
    async fn fake_server(reply: Option<&'static [u8]>) -> (SocketAddr, JoinHandle<(FrameHeader, Vec<u8>)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let header = FrameHeader::read_from(&mut stream, 4096).await.unwrap();
            let mut payload = vec![0u8; header.file_size as usize];
            stream.read_exact(&mut payload).await.unwrap();
            if let Some(reply) = reply {
                stream.write_all(reply).await.unwrap();
            }
            (header, payload)
        });

        (addr, task)
    }

    fn write_source(dir: &Path, rel: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_wire_filename_is_basename() {
        assert_eq!(wire_filename(Path::new("/var/data/report.pdf")).unwrap(), "report.pdf");
        assert_eq!(wire_filename(Path::new("report.pdf")).unwrap(), "report.pdf");
        assert_eq!(wire_filename(Path::new("a/b/c.tar.gz")).unwrap(), "c.tar.gz");
    }

    #[cfg(unix)]
    #[test]
    fn test_wire_filename_rejects_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"dir/bad\xff.bin"));
        let err = wire_filename(path).unwrap_err();
        assert!(matches!(err, FileError::NonUtf8Name(p) if p == path));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_name_fails_before_connecting() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(OsStr::from_bytes(b"bad\xff.bin"));
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let err = send_file(&path, addr).await.unwrap_err();
        assert!(matches!(err, TransferError::File(FileError::NonUtf8Name(_))));
    }

    #[tokio::test]
    async fn test_sends_frame_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let content: Vec<u8> = (0..50_000u32).map(|i| (i % 253) as u8).collect();
        let path = write_source(tmp.path(), "nested/dir/hello.bin", &content);
        let (addr, server) = fake_server(Some(b"all right\0")).await;

        let sender = FileSender::new(Config {
            buffer_size: 777,
            ..Config::default()
        });
        let report = sender.send(&path, addr).await.unwrap();
        let (header, payload) = server.await.unwrap();

        assert_eq!(header.filename, b"hello.bin");
        assert_eq!(header.file_size, content.len() as u64);
        assert_eq!(payload, content);
        assert_eq!(report.filename, "hello.bin");
        assert_eq!(report.bytes_sent, content.len() as u64);
        assert_eq!(report.checksum, crc32fast::hash(&content));
        assert_eq!(report.ack, Ack::Success);
    }

    #[tokio::test]
    async fn test_rejected_on_all_bad() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_source(tmp.path(), "x.txt", b"some data");
        let (addr, _server) = fake_server(Some(b"all bad\0")).await;

        let err = send_file(&path, addr).await.unwrap_err();
        assert!(matches!(err, TransferError::Rejected));
    }

    #[tokio::test]
    async fn test_no_ack_when_server_closes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_source(tmp.path(), "x.txt", b"some data");
        let (addr, _server) = fake_server(None).await;

        let err = send_file(&path, addr).await.unwrap_err();
        assert!(matches!(err, TransferError::NoAck));
    }

    #[tokio::test]
    async fn test_unknown_ack_token() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_source(tmp.path(), "x.txt", b"some data");
        let (addr, _server) = fake_server(Some(b"maybe\0")).await;

        let err = send_file(&path, addr).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::Protocol(ProtocolError::UnknownAck(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let err = send_file(tmp.path().join("nope.bin"), addr).await.unwrap_err();
        assert!(matches!(err, TransferError::File(FileError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_directory_is_unreadable() {
        let tmp = tempfile::tempdir().unwrap();
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let err = send_file(tmp.path(), addr).await.unwrap_err();
        assert!(matches!(err, TransferError::File(FileError::Unreadable { .. })));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_source(tmp.path(), "x.txt", b"data");
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let err = send_file(&path, addr).await.unwrap_err();
        assert!(matches!(err, TransferError::Connection { addr: a, .. } if a == addr));
    }
}
