//! 서버 수락 루프
//!
//! - 연결마다 독립 태스크로 핸들러 실행
//! - 수락 실패는 로그만 남기고 계속
//! - 선택적 동시 연결 상한 (세마포어)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::FileError;
use crate::handler::handle_connection;
use crate::{Config, Result, TransferError};

/// 바인드된 서버
pub struct Server {
    listener: TcpListener,
    config: Arc<Config>,

    /// 다음 연결에 부여할 순번
    next_client_sequence: u64,

    /// 동시 핸들러 수 제한
    limiter: Option<Arc<Semaphore>>,
}

impl Server {
    /// 저장 디렉터리 준비 후 소켓 바인딩
    pub async fn bind(addr: SocketAddr, config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.uploads_dir)
            .await
            .map_err(|source| FileError::Create {
                path: config.uploads_dir.clone(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransferError::Bind { addr, source })?;

        info!("TFP Server listening on {}", listener.local_addr()?);
        info!("Uploads directory: {}", config.uploads_dir.display());
        match config.max_connections {
            Some(limit) => info!("Max concurrent connections: {}", limit),
            None => info!("Max concurrent connections: unbounded"),
        }

        let limiter = config.max_connections.map(|n| Arc::new(Semaphore::new(n)));

        Ok(Self {
            listener,
            config: Arc::new(config),
            next_client_sequence: 0,
            limiter,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 수락 루프 실행. 정상 동작 중에는 반환하지 않음
    pub async fn run(mut self) -> Result<()> {
        loop {
            // 상한이 있으면 빈 자리가 생길 때까지 수락 대기
            let permit = match &self.limiter {
                Some(limiter) => limiter.clone().acquire_owned().await.ok(),
                None => None,
            };

            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("accept 실패: {}", e);
                    continue;
                }
            };

            let seq = self.next_client_sequence;
            self.next_client_sequence += 1;

            info!(client = seq, "new connection from {}", peer);

            let config = self.config.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let outcome = handle_connection(stream, seq, &config).await;
                debug!(client = seq, "handler finished: {}", outcome);
            });
        }
    }
}

/// 기본 설정으로 서버 실행
pub async fn serve(bind_address: SocketAddr) -> Result<()> {
    serve_with_config(bind_address, Config::default()).await
}

pub async fn serve_with_config(bind_address: SocketAddr, config: Config) -> Result<()> {
    Server::bind(bind_address, config).await?.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_creates_uploads_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = tmp.path().join("nested").join("uploads");
        let config = Config::default().with_uploads_dir(&uploads);

        let server = Server::bind("127.0.0.1:0".parse().unwrap(), config)
            .await
            .unwrap();

        assert!(uploads.is_dir());
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert_eq!(server.config().uploads_dir, uploads);
    }

    #[tokio::test]
    async fn test_bind_address_in_use() {
        let tmp = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        let result = Server::bind(addr, Config::default().with_uploads_dir(tmp.path())).await;

        assert!(matches!(result, Err(TransferError::Bind { addr: a, .. }) if a == addr));
    }
}
