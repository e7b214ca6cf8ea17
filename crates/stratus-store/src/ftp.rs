//! Minimal FTP client used as an archive tube.
//!
//! Binary mode, passive transfers, one short-lived session per store
//! operation. Credentials are always explicit: an [`FtpLogin`] is built by
//! the caller and passed in, never scraped from the process environment.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::StatInfo;
use crate::tube::Tube;

const CTRL_TIMEOUT: Duration = Duration::from_secs(30);

/// Explicit FTP credentials.
#[derive(Clone, Debug)]
pub struct FtpLogin {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl FtpLogin {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: 21,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// One control connection, logged in and set to binary mode.
struct FtpClient {
    ctrl: BufReader<TcpStream>,
}

impl FtpClient {
    fn connect(login: &FtpLogin) -> StoreResult<Self> {
        let stream = TcpStream::connect((login.host.as_str(), login.port))?;
        stream.set_read_timeout(Some(CTRL_TIMEOUT))?;
        stream.set_write_timeout(Some(CTRL_TIMEOUT))?;
        let mut client = Self {
            ctrl: BufReader::new(stream),
        };
        client.expect_reply(&[220])?;
        let (code, _) = client.command(&format!("USER {}", login.username))?;
        if code == 331 {
            client.command_expect(&format!("PASS {}", login.password), &[230])?;
        } else if code != 230 {
            return Err(StoreError::Protocol(format!("login refused ({code})")));
        }
        client.command_expect("TYPE I", &[200])?;
        Ok(client)
    }

    fn send(&mut self, line: &str) -> StoreResult<()> {
        let stream = self.ctrl.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\r\n")?;
        Ok(())
    }

    /// Read one (possibly multi-line) reply.
    fn read_reply(&mut self) -> StoreResult<(u16, String)> {
        let mut line = String::new();
        self.ctrl.read_line(&mut line)?;
        if line.len() < 4 {
            return Err(StoreError::Protocol(format!("short reply: {line:?}")));
        }
        let code: u16 = line[..3]
            .parse()
            .map_err(|_| StoreError::Protocol(format!("bad reply code: {line:?}")))?;
        if line.as_bytes()[3] == b'-' {
            // Multi-line reply: read until "NNN " terminator.
            let terminator = format!("{code} ");
            loop {
                let mut next = String::new();
                self.ctrl.read_line(&mut next)?;
                if next.is_empty() {
                    return Err(StoreError::Protocol("reply truncated".to_string()));
                }
                line.push_str(&next);
                if next.starts_with(&terminator) {
                    break;
                }
            }
        }
        debug!(code, "ftp reply");
        Ok((code, line.trim_end().to_string()))
    }

    fn expect_reply(&mut self, accepted: &[u16]) -> StoreResult<(u16, String)> {
        let (code, text) = self.read_reply()?;
        if accepted.contains(&code) {
            Ok((code, text))
        } else {
            Err(StoreError::Protocol(text))
        }
    }

    fn command(&mut self, line: &str) -> StoreResult<(u16, String)> {
        self.send(line)?;
        self.read_reply()
    }

    fn command_expect(&mut self, line: &str, accepted: &[u16]) -> StoreResult<(u16, String)> {
        self.send(line)?;
        self.expect_reply(accepted)
    }

    /// Enter passive mode and open the data connection.
    fn data_connection(&mut self) -> StoreResult<TcpStream> {
        let (_, text) = self.command_expect("PASV", &[227])?;
        let inner = text
            .find('(')
            .and_then(|open| text[open..].find(')').map(|close| &text[open + 1..open + close]))
            .ok_or_else(|| StoreError::Protocol(format!("unparsable PASV reply: {text}")))?;
        let fields: Vec<u16> = inner
            .split(',')
            .map(|f| f.trim().parse::<u16>())
            .collect::<Result<_, _>>()
            .map_err(|_| StoreError::Protocol(format!("unparsable PASV reply: {text}")))?;
        if fields.len() != 6 {
            return Err(StoreError::Protocol(format!("unparsable PASV reply: {text}")));
        }
        let host = format!("{}.{}.{}.{}", fields[0], fields[1], fields[2], fields[3]);
        let port = fields[4] * 256 + fields[5];
        let data = TcpStream::connect((host.as_str(), port))?;
        data.set_read_timeout(Some(CTRL_TIMEOUT))?;
        data.set_write_timeout(Some(CTRL_TIMEOUT))?;
        Ok(data)
    }

    fn size(&mut self, location: &str) -> StoreResult<Option<u64>> {
        let (code, text) = self.command(&format!("SIZE {location}"))?;
        if code == 213 {
            let size = text[3..]
                .trim()
                .parse()
                .map_err(|_| StoreError::Protocol(format!("bad SIZE reply: {text}")))?;
            Ok(Some(size))
        } else {
            Ok(None)
        }
    }

    fn retrieve(&mut self, location: &str, dest: &mut impl Write) -> StoreResult<bool> {
        let mut data = self.data_connection()?;
        let (code, _) = self.command(&format!("RETR {location}"))?;
        if !(code == 150 || code == 125) {
            return Ok(false);
        }
        io::copy(&mut data, dest)?;
        drop(data);
        self.expect_reply(&[226, 250])?;
        Ok(true)
    }

    fn store(&mut self, source: &mut impl Read, location: &str) -> StoreResult<bool> {
        self.make_dirs(location)?;
        let mut data = self.data_connection()?;
        let (code, _) = self.command(&format!("STOR {location}"))?;
        if !(code == 150 || code == 125) {
            return Ok(false);
        }
        io::copy(source, &mut data)?;
        data.shutdown(std::net::Shutdown::Both)?;
        drop(data);
        self.expect_reply(&[226, 250])?;
        Ok(true)
    }

    fn delete(&mut self, location: &str) -> StoreResult<bool> {
        let (code, _) = self.command(&format!("DELE {location}"))?;
        Ok(code == 250)
    }

    /// Best-effort MKD of every parent segment; servers answer 550 for
    /// directories that already exist and that is fine.
    fn make_dirs(&mut self, location: &str) -> StoreResult<()> {
        let Some((dir, _)) = location.rsplit_once('/') else {
            return Ok(());
        };
        let mut prefix = String::new();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);
            let _ = self.command(&format!("MKD {prefix}"))?;
        }
        Ok(())
    }

    fn quit(mut self) {
        let _ = self.send("QUIT");
        let _ = self.read_reply();
    }
}

/// Archive tube speaking FTP with explicit credentials.
#[derive(Clone, Debug)]
pub struct FtpTube {
    login: FtpLogin,
}

impl FtpTube {
    pub fn new(login: FtpLogin) -> Self {
        Self { login }
    }
}

impl Tube for FtpTube {
    fn name(&self) -> &'static str {
        "ftp"
    }

    fn check(&self, location: &str) -> Option<StatInfo> {
        let mut client = FtpClient::connect(&self.login).ok()?;
        let size = client.size(location).ok().flatten();
        client.quit();
        size.map(|size| StatInfo {
            size,
            mtime: None,
            is_dir: false,
        })
    }

    fn retrieve(&self, location: &str, dest: &Path) -> StoreResult<bool> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut client = FtpClient::connect(&self.login)?;
        let mut file = fs::File::create(dest)?;
        let done = client.retrieve(location, &mut file)?;
        client.quit();
        if !done {
            warn!(location, "ftp retrieve refused by server");
            let _ = fs::remove_file(dest);
        }
        Ok(done)
    }

    fn insert(&self, source: &Path, location: &str) -> StoreResult<bool> {
        let mut file = fs::File::open(source)?;
        let mut client = FtpClient::connect(&self.login)?;
        let done = client.store(&mut file, location)?;
        client.quit();
        if !done {
            warn!(location, "ftp store refused by server");
        }
        Ok(done)
    }

    fn delete(&self, location: &str) -> StoreResult<bool> {
        let mut client = FtpClient::connect(&self.login)?;
        let done = client.delete(location)?;
        client.quit();
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Scripted single-session FTP server good enough for the client.
    fn fake_server(script: Vec<(&'static str, &'static str)>) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut stream = stream;
            stream.write_all(b"220 fake\r\n").unwrap();
            let mut seen = Vec::new();
            for (expect_prefix, reply) in script {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end().to_string();
                assert!(
                    line.starts_with(expect_prefix),
                    "expected {expect_prefix:?}, got {line:?}"
                );
                seen.push(line);
                stream.write_all(reply.as_bytes()).unwrap();
                stream.write_all(b"\r\n").unwrap();
            }
            seen
        });
        (format!("127.0.0.1:{}", addr.port()), handle)
    }

    fn login_for(addr: &str) -> FtpLogin {
        let (host, port) = addr.rsplit_once(':').unwrap();
        FtpLogin::new(host, "ops", "secret").port(port.parse().unwrap())
    }

    #[test]
    fn login_and_size_query() {
        let (addr, server) = fake_server(vec![
            ("USER ops", "331 need password"),
            ("PASS secret", "230 ok"),
            ("TYPE I", "200 binary"),
            ("SIZE /x/y.grib", "213 12345"),
            ("QUIT", "221 bye"),
        ]);
        let tube = FtpTube::new(login_for(&addr));
        let stat = tube.check("/x/y.grib").unwrap();
        assert_eq!(stat.size, 12345);
        server.join().unwrap();
    }

    #[test]
    fn absent_file_checks_as_none() {
        let (addr, server) = fake_server(vec![
            ("USER ops", "331 need password"),
            ("PASS secret", "230 ok"),
            ("TYPE I", "200 binary"),
            ("SIZE /gone", "550 not found"),
            ("QUIT", "221 bye"),
        ]);
        let tube = FtpTube::new(login_for(&addr));
        assert!(tube.check("/gone").is_none());
        server.join().unwrap();
    }

    #[test]
    fn rejected_login_is_a_protocol_error() {
        let (addr, server) = fake_server(vec![
            ("USER ops", "331 need password"),
            ("PASS secret", "530 no"),
        ]);
        let login = login_for(&addr);
        assert!(matches!(
            FtpClient::connect(&login),
            Err(StoreError::Protocol(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn multiline_replies_are_consumed_whole() {
        let (addr, server) = fake_server(vec![
            ("USER ops", "230-welcome\r\n230-notice\r\n230 logged in"),
            ("TYPE I", "200 binary"),
            ("SIZE /a", "213 7"),
            ("QUIT", "221 bye"),
        ]);
        let tube = FtpTube::new(login_for(&addr));
        assert_eq!(tube.check("/a").unwrap().size, 7);
        server.join().unwrap();
    }
}
