use std::str::FromStr;
use std::time::Duration;

use crate::domain::entity::{JobId, JobRef, Priority};

/// A parsed command line. `put` bodies are read separately by the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Put {
        priority: Priority,
        delay: Duration,
        time_to_run: Duration,
        bytes: u64,
    },
    Delete(JobId),
    Peek(JobId),
    Reserve {
        timeout: Option<Duration>,
    },
    Quit,
}

impl Command {
    /// Parses one command line without its line terminator. Protocol errors
    /// come back as the response to send.
    pub fn parse(line: &str) -> Result<Command, Response> {
        let mut tokens = line.split(' ');
        let name = tokens.next().unwrap_or_default();
        let args: Vec<&str> = tokens.collect();

        match name {
            "put" => {
                let [priority, delay, ttr, bytes] = args.as_slice() else {
                    return Err(Response::BadFormat);
                };
                Ok(Command::Put {
                    priority: parse_int(priority)?,
                    delay: Duration::from_secs(parse_int::<u32>(delay)?.into()),
                    time_to_run: Duration::from_secs(parse_int::<u32>(ttr)?.into()),
                    bytes: parse_int(bytes)?,
                })
            }
            "delete" => Ok(Command::Delete(parse_single(&args)?)),
            "peek" => Ok(Command::Peek(parse_single(&args)?)),
            "reserve" if args.is_empty() => Ok(Command::Reserve { timeout: None }),
            "reserve" => Err(Response::BadFormat),
            "reserve-with-timeout" => {
                let [seconds] = args.as_slice() else {
                    return Err(Response::BadFormat);
                };
                Ok(Command::Reserve {
                    timeout: Some(Duration::from_secs(parse_int::<u32>(seconds)?.into())),
                })
            }
            "quit" => Ok(Command::Quit),
            _ => Err(Response::UnknownCommand),
        }
    }
}

fn parse_int<T: FromStr>(token: &str) -> Result<T, Response> {
    token.parse().map_err(|_| Response::BadFormat)
}

fn parse_single(args: &[&str]) -> Result<u64, Response> {
    match args {
        [value] => parse_int(value),
        _ => Err(Response::BadFormat),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Inserted(JobId),
    Deleted,
    NotFound,
    Found(JobRef),
    Reserved(JobRef),
    TimedOut,
    Draining,
    BadFormat,
    ExpectedCrlf,
    JobTooBig,
    UnknownCommand,
    InternalError,
}

impl Response {
    /// Wire encoding, CRLF terminated.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::Inserted(id) => format!("INSERTED {id}\r\n").into_bytes(),
            Response::Deleted => b"DELETED\r\n".to_vec(),
            Response::NotFound => b"NOT_FOUND\r\n".to_vec(),
            Response::Found(job) => encode_job("FOUND", job),
            Response::Reserved(job) => encode_job("RESERVED", job),
            Response::TimedOut => b"TIMED_OUT\r\n".to_vec(),
            Response::Draining => b"DRAINING\r\n".to_vec(),
            Response::BadFormat => b"BAD_FORMAT\r\n".to_vec(),
            Response::ExpectedCrlf => b"EXPECTED_CRLF\r\n".to_vec(),
            Response::JobTooBig => b"JOB_TOO_BIG\r\n".to_vec(),
            Response::UnknownCommand => b"UNKNOWN_COMMAND\r\n".to_vec(),
            Response::InternalError => b"INTERNAL_ERROR\r\n".to_vec(),
        }
    }

    /// Whether the connection must be closed after sending this response.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Response::InternalError)
    }
}

fn encode_job(status: &str, job: &JobRef) -> Vec<u8> {
    let mut out = format!("{status} {} {}\r\n", job.id, job.body.len()).into_bytes();
    out.extend_from_slice(&job.body);
    out.extend_from_slice(b"\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Job;
    use bytes::Bytes;

    #[test]
    fn test_parse_put() {
        assert_eq!(
            Command::parse("put 3 10 60 5"),
            Ok(Command::Put {
                priority: 3,
                delay: Duration::from_secs(10),
                time_to_run: Duration::from_secs(60),
                bytes: 5,
            })
        );
    }

    #[test]
    fn test_put_with_wrong_token_count() {
        for line in ["put", "put 0", "put 0 0", "put 0 0 60", "put 0 0 60 5 1", "put 0 0 60 5 "] {
            assert_eq!(Command::parse(line), Err(Response::BadFormat), "{line:?}");
        }
    }

    #[test]
    fn test_put_with_unparsable_integers() {
        for line in ["put x 0 60 5", "put 0 -1 60 5", "put 0 0 60 five", "put 0  0 60", "put 0 4294967296 60 5"] {
            assert_eq!(Command::parse(line), Err(Response::BadFormat), "{line:?}");
        }
    }

    #[test]
    fn test_parse_delete_and_peek() {
        assert_eq!(Command::parse("delete 999"), Ok(Command::Delete(999)));
        assert_eq!(Command::parse("peek 1"), Ok(Command::Peek(1)));
        assert_eq!(Command::parse("delete"), Err(Response::BadFormat));
        assert_eq!(Command::parse("delete 1 2"), Err(Response::BadFormat));
        assert_eq!(Command::parse("peek abc"), Err(Response::BadFormat));
    }

    #[test]
    fn test_parse_reserve() {
        assert_eq!(
            Command::parse("reserve"),
            Ok(Command::Reserve { timeout: None })
        );
        assert_eq!(
            Command::parse("reserve-with-timeout 5"),
            Ok(Command::Reserve {
                timeout: Some(Duration::from_secs(5))
            })
        );
        assert_eq!(Command::parse("reserve 5"), Err(Response::BadFormat));
        assert_eq!(
            Command::parse("reserve-with-timeout"),
            Err(Response::BadFormat)
        );
        assert_eq!(
            Command::parse("reserve-with-timeout 18446744073709551615"),
            Err(Response::BadFormat)
        );
    }

    #[test]
    fn test_unknown_commands() {
        for line in ["this is a test", "", "PUT 0 0 60 5", "quitx"] {
            assert_eq!(Command::parse(line), Err(Response::UnknownCommand), "{line:?}");
        }
        assert_eq!(Command::parse("quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_encode_responses() {
        assert_eq!(Response::Inserted(1).encode(), b"INSERTED 1\r\n");
        assert_eq!(Response::NotFound.encode(), b"NOT_FOUND\r\n");

        let job = Job::new(
            4,
            0,
            Duration::from_secs(60),
            Bytes::from_static(b"a\r\nb"),
        )
        .into_ref();
        assert_eq!(
            Response::Reserved(job).encode(),
            b"RESERVED 4 4\r\na\r\nb\r\n"
        );
    }
}
