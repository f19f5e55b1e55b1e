// LNP/BP Core Library implementing LNPBP specifications & standards
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! `onchaind`: per-channel on-chain resolution subprocess. Invoked by the
//! parent daemon with fd 0 already wired duplex (§6); takes no other
//! input and has no operator-facing surface beyond `--version`.

use std::io::{self};
use std::os::unix::io::FromRawFd;

use clap::Parser;
use onchaind::Driver;

/// On-chain resolution engine for a single Lightning Network payment
/// channel (BOLT-5). Not meant to be run by hand: the parent daemon
/// spawns one instance per closing channel with fd 0 wired duplex to it.
#[derive(Parser)]
#[command(name = "onchaind", version = concat!("onchaind v", env!("CARGO_PKG_VERSION")))]
struct Cli {}

fn main() {
    env_logger::init();
    let _ = Cli::parse();

    // Safety: fd 0 is guaranteed duplex by the parent's process-spawn
    // contract (§6); this process never reads argv beyond `--version`.
    let stdio = unsafe { std::fs::File::from_raw_fd(0) };
    let stream = DuplexFd(stdio);

    let mut driver = Driver::new(stream);
    if let Err(err) = driver.run() {
        log::error!("fatal: {}", err);
        std::process::exit(1);
    }
}

/// Wraps fd 0 so it can be read and written through the same handle, as
/// the parent's duplex pipe contract requires.
struct DuplexFd(std::fs::File);

impl io::Read for DuplexFd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.0, buf)
    }
}

impl io::Write for DuplexFd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.0, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.0)
    }
}
