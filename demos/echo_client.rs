// ABOUTME: Minimal CLI demo driving the mux core over a real TCP connection
// ABOUTME: Opens one stream, echoes stdin onto it, and prints whatever frames come back

use std::io::Write as _;

use argh::FromArgs;
use tcpmux::{Connection, MuxConfig, RouterEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

#[derive(FromArgs)]
/// Open one multiplexed stream against a yamux-compatible tunnel server and
/// echo stdin lines onto it, printing whatever the peer sends back.
struct CliArgs {
    /// address of the tunnel server, host:port
    #[argh(option, short = 'a', default = "String::from(\"127.0.0.1:7000\")")]
    addr: String,

    /// disable mux framing and speak the transport raw
    #[argh(switch)]
    no_mux: bool,
}

#[tokio::main]
async fn main() -> tcpmux::Result<()> {
    tracing_subscriber::fmt::init();

    let cli_args: CliArgs = argh::from_env();
    let config = if cli_args.no_mux {
        MuxConfig::disabled()
    } else {
        MuxConfig::default()
    };

    let transport = TcpStream::connect(&cli_args.addr).await?;
    let mut conn = Connection::new(transport, config);
    let stream_id = conn.open_stream();
    println!("opened stream {stream_id} against {}", cli_args.addr);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        conn.write_stream(stream_id, line.as_bytes()).await?;
                    }
                    None => {
                        conn.close_stream(stream_id).await?;
                        break;
                    }
                }
            }
            event = conn.on_frame() => {
                match event? {
                    Some(RouterEvent::DataDelivered { stream_id, len }) => {
                        println!("stream {stream_id}: {len} bytes delivered");
                        std::io::stdout().flush().ok();
                    }
                    Some(RouterEvent::StreamTornDown { stream_id: torn }) => {
                        println!("stream {torn} torn down");
                        if torn == stream_id {
                            break;
                        }
                    }
                    Some(other) => println!("{other:?}"),
                    None => {
                        println!("connection closed by peer");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
