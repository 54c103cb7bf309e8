use std::{
    io::{self, ErrorKind},
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    time::Duration,
};

use tapcp_vfs::{open, Target, Transfer};

use crate::packet::{self, error_code, Packet, BLOCK_SIZE, MAX_DATAGRAM};

#[derive(Debug, Clone)]
pub struct Config {
    /// How long to wait for the peer before retransmitting.
    pub timeout: Duration,
    /// Retransmissions attempted before a transfer is abandoned.
    pub retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            retries: 5,
        }
    }
}

/// Builder to create a [Server] instance and modify configuration options
///
/// # Example
///
/// ```ignore
/// use tapcp_server::server::Builder;
/// use std::time::Duration;
///
/// let server = Builder::new()
///     .timeout(Duration::from_millis(500))
///     .retries(8)
///     .bind(my_target, "0.0.0.0:69")?;
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the per-packet peer timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set how many retransmissions are attempted.
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Bind the request socket and return the server.
    pub fn bind<T: Target>(self, target: T, addr: impl ToSocketAddrs) -> io::Result<Server<T>> {
        Server::bind(target, self.config, addr)
    }
}

/// Lock-step TFTP engine serving the virtual filesystem of one target.
///
/// Requests arrive on the bound socket; each accepted transfer then runs
/// on a fresh ephemeral socket so the client can tell concurrent requests
/// apart by port. Transfers are served one at a time, which also
/// serializes all hardware access.
pub struct Server<T: Target> {
    target: T,
    socket: UdpSocket,
    config: Config,
}

impl<T: Target> Server<T> {
    pub fn bind(target: T, config: Config, addr: impl ToSocketAddrs) -> io::Result<Server<T>> {
        let socket = UdpSocket::bind(addr)?;
        log::info!("listening on {}", socket.local_addr()?);
        Ok(Server {
            target,
            socket,
            config,
        })
    }

    /// Address of the request socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serves requests forever.
    pub fn serve(&mut self) -> io::Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let (n, peer) = self.socket.recv_from(&mut buf)?;
            if let Err(e) = self.dispatch(&buf[..n], peer) {
                // A failed transfer ends that transfer, not the server.
                log::error!("transfer with {} failed: {}", peer, e);
            }
        }
    }

    fn dispatch(&mut self, datagram: &[u8], peer: SocketAddr) -> io::Result<()> {
        let (op, filename, mode) = match Packet::parse(datagram) {
            Ok(Packet::Request { op, filename, mode }) => (op, filename.to_string(), mode),
            Ok(other) => {
                log::debug!("{} sent {:?} outside a transfer", peer, other);
                self.socket.send_to(
                    &packet::error(error_code::ILLEGAL_OPERATION, "not a request"),
                    peer,
                )?;
                return Ok(());
            }
            Err(e) => {
                log::debug!("bad datagram from {}: {}", peer, e);
                self.socket.send_to(
                    &packet::error(error_code::ILLEGAL_OPERATION, "malformed request"),
                    peer,
                )?;
                return Ok(());
            }
        };
        log::info!("{:?} '{}' ({:?}) from {}", op, filename, mode, peer);

        let transfer = match open(&mut self.target, &filename, mode, op) {
            Ok(transfer) => transfer,
            Err(e) => {
                log::info!("rejected '{}': {}", filename, e);
                let code = if e.is_not_found() {
                    error_code::FILE_NOT_FOUND
                } else {
                    error_code::ACCESS_VIOLATION
                };
                self.socket.send_to(&packet::error(code, &e.to_string()), peer)?;
                return Ok(());
            }
        };

        // Fresh transfer identifier: data flows on its own port.
        let mut local = self.socket.local_addr()?;
        local.set_port(0);
        let data_socket = UdpSocket::bind(local)?;
        data_socket.connect(peer)?;
        data_socket.set_read_timeout(Some(self.config.timeout))?;

        if transfer.is_write() {
            self.run_put(&data_socket, transfer)
        } else {
            self.run_get(&data_socket, transfer)
        }
    }

    fn run_get(&mut self, socket: &UdpSocket, mut transfer: Transfer) -> io::Result<()> {
        let mut block: u16 = 1;
        let mut data = [0u8; BLOCK_SIZE];
        loop {
            let len = transfer.produce(&mut self.target, &mut data);
            log::trace!("block {}: {} bytes", block, len);
            self.send_until_acked(socket, &packet::data(block, &data[..len]), block)?;
            if len < BLOCK_SIZE {
                log::debug!("read transfer complete at block {}", block);
                return Ok(());
            }
            block = block.wrapping_add(1);
        }
    }

    /// Sends `pkt` and waits for its acknowledgement, retransmitting on
    /// timeout. Stale acknowledgements are ignored.
    fn send_until_acked(&self, socket: &UdpSocket, pkt: &[u8], block: u16) -> io::Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM];
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                log::debug!("retransmitting block {} (attempt {})", block, attempt);
            }
            socket.send(pkt)?;
            loop {
                match socket.recv(&mut buf) {
                    Ok(n) => match Packet::parse(&buf[..n]) {
                        Ok(Packet::Ack { block: acked }) if acked == block => return Ok(()),
                        Ok(Packet::Ack { .. }) => continue,
                        Ok(Packet::Error { code, message }) => {
                            log::info!("peer aborted: error {} '{}'", code, message);
                            return Err(io::Error::other("peer aborted transfer"));
                        }
                        _ => continue,
                    },
                    Err(e)
                        if e.kind() == ErrorKind::WouldBlock
                            || e.kind() == ErrorKind::TimedOut =>
                    {
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Err(io::Error::new(
            ErrorKind::TimedOut,
            "no acknowledgement from peer",
        ))
    }

    fn run_put(&mut self, socket: &UdpSocket, mut transfer: Transfer) -> io::Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let mut expected: u16 = 1;
        let mut attempts = 0;
        // Acknowledging block zero accepts the request.
        socket.send(&packet::ack(0))?;
        loop {
            match socket.recv(&mut buf) {
                Ok(n) => match Packet::parse(&buf[..n]) {
                    Ok(Packet::Data { block, payload }) if block == expected => {
                        attempts = 0;
                        if let Err(e) = transfer.consume(&mut self.target, payload) {
                            log::info!("write aborted: {}", e);
                            socket.send(&packet::error(
                                error_code::ACCESS_VIOLATION,
                                &e.to_string(),
                            ))?;
                            return Ok(());
                        }
                        socket.send(&packet::ack(expected))?;
                        if payload.len() < BLOCK_SIZE {
                            log::debug!("write transfer complete at block {}", expected);
                            return Ok(());
                        }
                        expected = expected.wrapping_add(1);
                    }
                    Ok(Packet::Data { block, .. }) if block == expected.wrapping_sub(1) => {
                        // The peer missed our acknowledgement.
                        socket.send(&packet::ack(block))?;
                    }
                    Ok(Packet::Error { code, message }) => {
                        log::info!("peer aborted: error {} '{}'", code, message);
                        return Ok(());
                    }
                    other => log::debug!("ignoring {:?} mid-write", other),
                },
                Err(e)
                    if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
                {
                    attempts += 1;
                    if attempts > self.config.retries {
                        return Err(io::Error::new(
                            ErrorKind::TimedOut,
                            "peer stopped sending data",
                        ));
                    }
                    socket.send(&packet::ack(expected.wrapping_sub(1)))?;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;
    use tapcp_vfs::{CatalogBuilder, Mode, Op, HELP_TEXT};

    struct BenchTarget {
        fpga: Vec<u32>,
        catalog: Vec<u8>,
    }

    impl BenchTarget {
        fn new() -> BenchTarget {
            BenchTarget {
                fpga: vec![0; 256],
                catalog: CatalogBuilder::new()
                    .push("sys_scratchpad", 0x40, 0x40, 3, false)
                    .finish(),
            }
        }
    }

    impl Target for BenchTarget {
        fn fpga_size(&self) -> u32 {
            (self.fpga.len() * 4) as u32
        }
        fn read_fpga_word(&mut self, addr: u32) -> u32 {
            self.fpga[(addr / 4) as usize]
        }
        fn write_fpga_word(&mut self, addr: u32, word: u32) {
            self.fpga[(addr / 4) as usize] = word;
        }
        fn read_cpu_byte(&mut self, _addr: u32) -> u8 {
            0
        }
        fn catalog(&self) -> &[u8] {
            &self.catalog
        }
    }

    fn start_server() -> SocketAddr {
        let mut server = Builder::new()
            .timeout(Duration::from_millis(200))
            .bind(BenchTarget::new(), "127.0.0.1:0")
            .unwrap();
        let addr = server.local_addr().unwrap();
        thread::spawn(move || server.serve());
        addr
    }

    /// Minimal lock-step client read.
    fn client_get(server: SocketAddr, filename: &str, mode: Mode) -> Result<Vec<u8>, String> {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        socket
            .send_to(&packet::request(Op::Get, filename, mode), server)
            .unwrap();

        let mut out = Vec::new();
        let mut buf = [0u8; MAX_DATAGRAM];
        let mut expected: u16 = 1;
        loop {
            let (n, from) = socket.recv_from(&mut buf).unwrap();
            match Packet::parse(&buf[..n]).unwrap() {
                Packet::Data { block, payload } if block == expected => {
                    out.extend_from_slice(payload);
                    socket.send_to(&packet::ack(block), from).unwrap();
                    if payload.len() < BLOCK_SIZE {
                        return Ok(out);
                    }
                    expected = expected.wrapping_add(1);
                }
                Packet::Error { code, message } => {
                    return Err(format!("error {}: {}", code, message));
                }
                other => panic!("unexpected packet {:?}", other),
            }
        }
    }

    /// Minimal lock-step client write.
    fn client_put(server: SocketAddr, filename: &str, mode: Mode, payload: &[u8]) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        socket
            .send_to(&packet::request(Op::Put, filename, mode), server)
            .unwrap();

        let mut buf = [0u8; MAX_DATAGRAM];
        let (n, peer) = socket.recv_from(&mut buf).unwrap();
        assert_eq!(Packet::parse(&buf[..n]).unwrap(), Packet::Ack { block: 0 });

        let mut block: u16 = 1;
        for chunk in payload.chunks(BLOCK_SIZE) {
            socket.send_to(&packet::data(block, chunk), peer).unwrap();
            let (n, _) = socket.recv_from(&mut buf).unwrap();
            assert_eq!(Packet::parse(&buf[..n]).unwrap(), Packet::Ack { block });
            block = block.wrapping_add(1);
        }
        if payload.len() % BLOCK_SIZE == 0 {
            socket.send_to(&packet::data(block, &[]), peer).unwrap();
            let (n, _) = socket.recv_from(&mut buf).unwrap();
            assert_eq!(Packet::parse(&buf[..n]).unwrap(), Packet::Ack { block });
        }
    }

    #[test]
    fn get_help_over_loopback() {
        let server = start_server();
        let out = client_get(server, "/help", Mode::Netascii).unwrap();
        assert_eq!(out, HELP_TEXT.as_bytes());
    }

    #[test]
    fn octet_write_read_round_trip() {
        let server = start_server();
        let payload: Vec<u8> = (0u8..32).collect();
        client_put(server, "/dev/sys_scratchpad", Mode::Octet, &payload);
        let back = client_get(server, "/dev/sys_scratchpad.0.8", Mode::Octet).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn text_write_lands_in_fpga_space() {
        let server = start_server();
        client_put(
            server,
            "/fpga.40",
            Mode::Netascii,
            b"label: DEADBEEF CAFEBABE\n",
        );
        let back = client_get(server, "/fpga.40.8", Mode::Netascii).unwrap();
        assert_eq!(back, b"00000000: DEADBEEF CAFEBABE\n");
    }

    #[test]
    fn unknown_device_answers_file_not_found() {
        let server = start_server();
        let err = client_get(server, "/dev/bogus", Mode::Octet).unwrap_err();
        assert!(err.starts_with("error 1"), "{}", err);
    }

    #[test]
    fn block_aligned_transfers_end_with_empty_block() {
        let server = start_server();
        // Exactly two full blocks each way: the transfer must terminate
        // with a zero-length DATA packet, not by a short block.
        let payload: Vec<u8> = (0u8..=255).cycle().take(1024).collect();
        client_put(server, "/fpga.0", Mode::Octet, &payload);
        let back = client_get(server, "/fpga.0.400", Mode::Octet).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn multi_block_read_is_reassembled() {
        let server = start_server();
        // 1024 FPGA bytes in text form span several 512-byte blocks.
        let out = client_get(server, "/fpga.0.400", Mode::Netascii).unwrap();
        let lines: Vec<&str> = std::str::from_utf8(&out).unwrap().lines().collect();
        assert_eq!(lines.len(), 64);
        assert!(lines[0].starts_with("00000000: "));
        assert!(lines[63].starts_with("000003F0: "));
    }
}
