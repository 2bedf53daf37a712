//! 와이어 프로토콜 코덱
//!
//! 프레임 구조 (모든 정수는 빅엔디안):
//!
//! ```text
//! [u16 filename_len][filename][u64 file_size][payload ...]
//! <- "all right\0" | "all bad\0"
//! ```
//!
//! 체크섬 필드는 없음. 무결성은 TCP와 `file_size` 카운트에만 의존

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ProtocolError;
use crate::Result;

/// 파일 이름 길이 필드 크기
pub const FILENAME_LEN_SIZE: usize = 2;

/// 파일 크기 필드 크기
pub const FILE_SIZE_SIZE: usize = 8;

/// 성공 ACK 토큰
pub const ACK_SUCCESS: &str = "all right";

/// 실패 ACK 토큰
pub const ACK_FAILURE: &str = "all bad";

/// 와이어상 ACK 최대 길이 (종료 NUL 포함)
pub const MAX_ACK_LEN: usize = ACK_SUCCESS.len() + 1;

/// 수신 중 스테이징 파일 이름 접두사/접미사. 업로드 이름으로는 예약됨
pub const STAGING_PREFIX: &str = ".tfp-";
pub const STAGING_SUFFIX: &str = ".part";

pub fn encode_filename_length(n: u16) -> [u8; FILENAME_LEN_SIZE] {
    n.to_be_bytes()
}

pub fn decode_filename_length(bytes: &[u8]) -> std::result::Result<u16, ProtocolError> {
    let mut buf = take_field(bytes, "filename_length", FILENAME_LEN_SIZE)?;
    Ok(buf.get_u16())
}

pub fn encode_file_size(n: u64) -> [u8; FILE_SIZE_SIZE] {
    n.to_be_bytes()
}

pub fn decode_file_size(bytes: &[u8]) -> std::result::Result<u64, ProtocolError> {
    let mut buf = take_field(bytes, "file_size", FILE_SIZE_SIZE)?;
    Ok(buf.get_u64())
}

fn take_field<'a>(
    bytes: &'a [u8],
    field: &'static str,
    expected: usize,
) -> std::result::Result<&'a [u8], ProtocolError> {
    bytes.get(..expected).ok_or(ProtocolError::Truncated {
        field,
        expected,
        got: bytes.len(),
    })
}

/// 프레임 헤더 (페이로드 앞의 세 필드)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// 송신측이 보낸 파일 이름 (원본 바이트)
    pub filename: Vec<u8>,

    /// 뒤따르는 페이로드 바이트 수
    pub file_size: u64,
}

impl FrameHeader {
    pub fn new(filename: impl Into<Vec<u8>>, file_size: u64) -> Self {
        Self {
            filename: filename.into(),
            file_size,
        }
    }

    /// 헤더 직렬화 길이
    pub fn encoded_len(&self) -> usize {
        FILENAME_LEN_SIZE + self.filename.len() + FILE_SIZE_SIZE
    }

    /// 바이트로 직렬화
    pub fn encode(&self) -> std::result::Result<Bytes, ProtocolError> {
        let name_len = u16::try_from(self.filename.len()).map_err(|_| ProtocolError::NameTooLong {
            len: self.filename.len(),
            max: u16::MAX as usize,
        })?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(&encode_filename_length(name_len));
        buf.put_slice(&self.filename);
        buf.put_slice(&encode_file_size(self.file_size));
        Ok(buf.freeze())
    }

    /// 버퍼에서 역직렬화
    ///
    /// 성공 시 헤더와 소비한 바이트 수를 반환. 뒤따르는 페이로드는 건드리지 않음
    pub fn decode(
        bytes: &[u8],
        max_name_len: usize,
    ) -> std::result::Result<(Self, usize), ProtocolError> {
        let name_len = decode_filename_length(bytes)? as usize;
        if name_len > max_name_len {
            return Err(ProtocolError::NameTooLong {
                len: name_len,
                max: max_name_len,
            });
        }

        let rest = &bytes[FILENAME_LEN_SIZE..];
        let filename = take_field(rest, "filename", name_len)?.to_vec();
        let file_size = decode_file_size(&rest[name_len..])?;

        let header = Self::new(filename, file_size);
        let consumed = header.encoded_len();
        Ok((header, consumed))
    }

    /// 스트림에서 헤더를 필드 단위로 읽음
    ///
    /// 필드 도중 EOF는 `ProtocolError::Truncated`, 그 외 IO 실패는 `TransferError::Io`
    pub async fn read_from<R>(reader: &mut R, max_name_len: usize) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut len_buf = [0u8; FILENAME_LEN_SIZE];
        read_field(reader, &mut len_buf, "filename_length").await?;
        let name_len = decode_filename_length(&len_buf)? as usize;

        if name_len > max_name_len {
            return Err(ProtocolError::NameTooLong {
                len: name_len,
                max: max_name_len,
            }
            .into());
        }

        let mut filename = vec![0u8; name_len];
        read_field(reader, &mut filename, "filename").await?;

        let mut size_buf = [0u8; FILE_SIZE_SIZE];
        read_field(reader, &mut size_buf, "file_size").await?;
        let file_size = decode_file_size(&size_buf)?;

        Ok(Self::new(filename, file_size))
    }
}

async fn read_field<R>(reader: &mut R, buf: &mut [u8], field: &'static str) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::Truncated {
                field,
                expected: buf.len(),
                got: filled,
            }
            .into());
        }
        filled += n;
    }
    Ok(())
}

/// 수신측 응답 토큰
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// 선언된 크기만큼 모두 수신
    Success,

    /// 크기 불일치 또는 전송 실패
    Failure,
}

impl Ack {
    pub fn from_outcome(success: bool) -> Self {
        if success {
            Ack::Success
        } else {
            Ack::Failure
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Ack::Success => ACK_SUCCESS,
            Ack::Failure => ACK_FAILURE,
        }
    }

    /// 와이어 표현 (토큰 + NUL 종료 바이트)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MAX_ACK_LEN);
        buf.extend_from_slice(self.as_str().as_bytes());
        buf.push(0);
        buf
    }

    /// 수신한 바이트를 토큰으로 해석
    ///
    /// 종료 NUL은 없어도 되고 여러 개여도 됨
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, ProtocolError> {
        let end = bytes
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |pos| pos + 1);

        match &bytes[..end] {
            b if b == ACK_SUCCESS.as_bytes() => Ok(Ack::Success),
            b if b == ACK_FAILURE.as_bytes() => Ok(Ack::Failure),
            _ => Err(ProtocolError::UnknownAck(bytes.to_vec())),
        }
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 마지막 디렉터리 구분자 뒤의 부분 문자열
///
/// 구분자가 없으면 전체 문자열. `/`와 `\` 모두 구분자로 취급
pub fn basename(name: &str) -> &str {
    name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name)
}

/// 수신한 파일 이름으로 저장용 이름 결정
///
/// basename 적용 후 저장 디렉터리를 벗어날 수 있는 이름은 거부
pub fn storage_name(raw: &[u8]) -> std::result::Result<String, ProtocolError> {
    let name = std::str::from_utf8(raw)
        .map_err(|_| ProtocolError::InvalidFilename(String::from_utf8_lossy(raw).into_owned()))?;

    let base = basename(name);
    if base.is_empty()
        || base == "."
        || base == ".."
        || base.contains('\0')
        || is_staging_name(base)
    {
        return Err(ProtocolError::InvalidFilename(name.to_string()));
    }

    Ok(base.to_string())
}

/// 연결 순번으로 만든 스테이징 파일 이름
///
/// 길이가 클라이언트가 보낸 이름에 의존하지 않음
pub fn staging_name(client_sequence: u64) -> String {
    format!("{}{}{}", STAGING_PREFIX, client_sequence, STAGING_SUFFIX)
}

/// 스테이징 파일 이름 형식인지 확인
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX)
}
