/*! AIS receiver.

Connects to an `rtl_tcp`-compatible server streaming raw IQ bytes, runs
them through the channelizer / demodulator / HDLC / CRC / message-decode
pipeline for both AIS channels, and prints decoded reports to stdout.

```no_run
$ ./esar-rx --host 127.0.0.1 --port 2345
```
*/
use clap::Parser;

use esar::ais::AisDecoder;
use esar::channelizer::Channelizer;
use esar::demod::Demodulator;
use esar::graph::Graph;
use esar::record_sink::RecordSink;
use esar::tcp_source::TcpSource;

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    /// Host running the rtl_tcp-compatible IQ server.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port the IQ server listens on.
    #[arg(long, default_value = "2345")]
    port: u16,

    /// Input sample rate, Hz.
    #[arg(long, default_value = "300000")]
    samp_rate: f64,

    /// Increase log verbosity. Repeatable (-v, -vv, -vvv, ...).
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: usize,
}

/// Network-setup failures, per the exit-code contract: DNS resolution,
/// socket creation, and connection failures each get a distinct nonzero
/// code so a wrapper script can tell them apart.
fn exit_code_for(e: &std::io::Error) -> i32 {
    match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::InvalidInput => 2, // DNS / bad address
        std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::TimedOut => 4, // connect
        _ => 3, // socket / other I/O setup failure
    }
}

fn main() {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("esar")
        .quiet(false)
        .verbosity(opt.verbose)
        .timestamp(stderrlog::Timestamp::Second)
        .init()
        .expect("failed to initialize logging");

    let (src, src_out) = match TcpSource::<u8>::new_rtl_tcp(&opt.host, opt.port) {
        Ok(v) => v,
        Err(e) => {
            let io_err = e
                .downcast_ref::<std::io::Error>()
                .map(|e| e.kind())
                .unwrap_or(std::io::ErrorKind::Other);
            eprintln!("esar-rx: failed to connect to {}:{}: {e}", opt.host, opt.port);
            std::process::exit(exit_code_for(&std::io::Error::from(io_err)));
        }
    };

    let mut g = Graph::new();
    g.add(Box::new(src));

    let (channelizer, ch1, ch2) = Channelizer::new(src_out, opt.samp_rate);
    g.add(Box::new(channelizer));

    let final_rate = opt.samp_rate / 6.0;

    let (demod1, fm1, am1) = Demodulator::new(ch1);
    g.add(Box::new(demod1));
    let (demod2, fm2, am2) = Demodulator::new(ch2);
    g.add(Box::new(demod2));

    let (dec1, msgs1) = AisDecoder::new(fm1, am1, final_rate);
    g.add(Box::new(dec1));
    let (dec2, msgs2) = AisDecoder::new(fm2, am2, final_rate);
    g.add(Box::new(dec2));

    g.add(Box::new(RecordSink::new(msgs1, std::io::stdout())));
    g.add(Box::new(RecordSink::new(msgs2, std::io::stdout())));

    match g.run() {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("esar-rx: pipeline error: {e}");
            std::process::exit(1);
        }
    }
}
