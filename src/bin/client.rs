//! TFP 클라이언트 (송신자) - TCP File Push
//!
//! 파일 하나를 서버로 전송하고 ACK 토큰 출력
//!
//! 사용법:
//!   cargo run --release --bin tfp-client -- <FILE> <SERVER IP> <SERVER PORT> [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin tfp-client -- ./report.pdf 127.0.0.1 9000
//!   cargo run --release --bin tfp-client -- ./large.bin 192.168.1.100 9000 --buffer-size 1048576

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tfp::{Config, FileSender};

const USAGE: &str = "Usage: tfp-client <PATH TO FILE> <SERVER IP> <SERVER PORT> [--buffer-size BYTES]";

/// 클라이언트 설정
struct ClientOptions {
    file_path: PathBuf,
    server_addr: SocketAddr,
    config: Config,
}

fn parse_args(args: &[String]) -> Result<ClientOptions, String> {
    let mut config = Config::default();
    let mut positional = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--buffer-size" | "-b" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| format!("{} 값 필요\n{}", args[i], USAGE))?;
                config.buffer_size = value
                    .parse()
                    .map_err(|_| format!("{}: 유효한 숫자 필요 (got {})", args[i], value))?;
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"TFP Client - TCP File Push 클라이언트

파일 하나를 서버로 전송하고 서버 응답("all right" / "all bad")을 출력

{}

옵션:
  -b, --buffer-size <BYTES>   송신 청크 크기 (기본: 65536)
  -h, --help                  이 도움말 출력
"#,
                    USAGE
                );
                std::process::exit(0);
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    if positional.len() != 3 {
        return Err(USAGE.to_string());
    }

    let ip: IpAddr = positional[1]
        .parse()
        .map_err(|_| format!("유효하지 않은 IP: {}", positional[1]))?;
    let port: u16 = positional[2]
        .parse()
        .map_err(|_| format!("유효하지 않은 포트: {}", positional[2]))?;

    Ok(ClientOptions {
        file_path: PathBuf::from(&positional[0]),
        server_addr: SocketAddr::new(ip, port),
        config,
    })
}

async fn run(options: ClientOptions) -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("TFP Client starting...");
    info!("Server address: {}", options.server_addr);
    info!("File: {}", options.file_path.display());

    let sender = FileSender::new(options.config);
    let report = sender.send(&options.file_path, options.server_addr).await?;

    println!(
        "file {} sent: {} bytes in {:.2}s ({:.2} KB/s, crc32={:08x})",
        report.filename,
        report.bytes_sent,
        report.elapsed.as_secs_f64(),
        report.average_bps / 1024.0,
        report.checksum
    );
    println!("server response: {}", report.ack);
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
