//! TFP 서버 (수신자) - TCP File Push
//!
//! 연결마다 파일 하나를 받아 업로드 디렉터리에 저장
//! - 연결당 독립 태스크
//! - 3초 주기 순간/평균 속도 로깅
//!
//! 사용법:
//!   cargo run --release --bin tfp-server -- <PORT> [OPTIONS]
//!
//! 예시:
//!   # 기본 수신 (./uploads 에 저장)
//!   cargo run --release --bin tfp-server -- 9000
//!
//!   # 저장 위치 지정 + 동시 연결 64개로 제한
//!   cargo run --release --bin tfp-server -- 9000 --uploads-dir /srv/incoming --max-connections 64

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tfp::{Config, Server};

const USAGE: &str = "Usage: tfp-server <PORT> [--uploads-dir DIR] [--max-connections N] [--buffer-size BYTES] [--sample-interval SECS]";

/// 서버 설정
struct ServerOptions {
    bind_addr: SocketAddr,
    config: Config,
}

fn parse_args(args: &[String]) -> Result<ServerOptions, String> {
    let mut config = Config::default();
    let mut positional = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--uploads-dir" | "-d" => {
                config.uploads_dir = PathBuf::from(flag_value(args, i)?);
                i += 1;
            }
            "--max-connections" | "-m" => {
                let limit: usize = parse_number(args, i)?;
                config = config.with_max_connections(limit);
                i += 1;
            }
            "--buffer-size" => {
                config.buffer_size = parse_number(args, i)?;
                i += 1;
            }
            "--sample-interval" => {
                config.sample_interval = Duration::from_secs(parse_number(args, i)?);
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"TFP Server - TCP File Push 서버

연결마다 파일 하나를 받아 업로드 디렉터리에 저장

{}

옵션:
  -d, --uploads-dir <DIR>      저장 디렉터리 (기본: uploads)
  -m, --max-connections <N>    동시 처리 연결 수 상한 (기본: 제한 없음)
  --buffer-size <BYTES>        수신 청크 크기 (기본: 65536)
  --sample-interval <SECS>     처리율 로깅 주기 (기본: 3)
  -h, --help                   이 도움말 출력
"#,
                    USAGE
                );
                std::process::exit(0);
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    if positional.len() != 1 {
        return Err(USAGE.to_string());
    }

    let port: u16 = positional[0]
        .parse()
        .map_err(|_| format!("유효하지 않은 포트: {}", positional[0]))?;

    Ok(ServerOptions {
        bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
        config,
    })
}

fn flag_value(args: &[String], i: usize) -> Result<&str, String> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("{} 값 필요\n{}", args[i], USAGE))
}

fn parse_number<T: std::str::FromStr>(args: &[String], i: usize) -> Result<T, String> {
    let value = flag_value(args, i)?;
    value
        .parse()
        .map_err(|_| format!("{}: 유효한 숫자 필요 (got {})", args[i], value))
}

async fn run(options: ServerOptions) -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("TFP Server starting...");
    info!("Bind address: {}", options.bind_addr);
    info!("Buffer size: {} bytes", options.config.buffer_size);
    info!(
        "Sample interval: {:.1}s",
        options.config.sample_interval.as_secs_f64()
    );

    let server = Server::bind(options.bind_addr, options.config).await?;
    server.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(options).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
