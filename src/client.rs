use std::collections::VecDeque;

use anyhow::{Context, Result};
use log::warn;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;

use crate::core_fs::sandbox::extract_filename;
use crate::core_network::line_buffer::LineBuffer;
use crate::core_network::transfer;

/// Runs the client against stdin/stdout with a `> ` prompt.
pub async fn run_interactive(addr: &str, port: u16) -> Result<()> {
    let input = BufReader::new(tokio::io::stdin()).lines();
    let client = Client::connect(addr, port, input, tokio::io::stdout(), true).await?;
    client.run().await
}

/// Runs the client with commands read from `input` and replies written
/// to `output`. The loop ends when the server closes the connection,
/// so batch scripts normally finish with `exit`.
pub async fn run_batch(addr: &str, port: u16, input: &str, output: &str) -> Result<()> {
    let input_file = File::open(input)
        .await
        .with_context(|| format!("Error opening input file {}", input))?;
    let output_file = File::create(output)
        .await
        .with_context(|| format!("Error opening output file {}", output))?;

    let client = Client::connect(
        addr,
        port,
        BufReader::new(input_file).lines(),
        output_file,
        false,
    )
    .await?;
    client.run().await
}

enum Event {
    Input(Option<String>),
    SocketReady,
}

/// Client side of the control connection: forwards command lines,
/// prints framed replies, and spawns detached side-channel workers for
/// `get`/`put`. Pending transfers are tracked in FIFOs keyed by the
/// order the commands were sent, which is also the order the server
/// answers them in.
struct Client<R, W> {
    stream: TcpStream,
    buffer: LineBuffer,
    server_addr: String,
    input: Lines<R>,
    output: W,
    interactive: bool,
    downloads: VecDeque<String>,
    uploads: VecDeque<String>,
}

impl<R, W> Client<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn connect(
        addr: &str,
        port: u16,
        input: Lines<R>,
        output: W,
        interactive: bool,
    ) -> Result<Client<R, W>> {
        let stream = TcpStream::connect((addr, port))
            .await
            .with_context(|| format!("Failed to connect to {}:{}", addr, port))?;

        Ok(Client {
            stream,
            buffer: LineBuffer::new(),
            server_addr: addr.to_string(),
            input,
            output,
            interactive,
            downloads: VecDeque::new(),
            uploads: VecDeque::new(),
        })
    }

    async fn run(mut self) -> Result<()> {
        if self.interactive {
            self.prompt().await?;
        }

        let mut input_open = true;
        loop {
            let event = tokio::select! {
                line = self.input.next_line(), if input_open => Event::Input(line?),
                ready = self.stream.readable() => {
                    ready?;
                    Event::SocketReady
                }
            };

            match event {
                Event::Input(Some(line)) => {
                    self.handle_input(&line).await?;
                    if self.interactive {
                        self.prompt().await?;
                    }
                }
                Event::Input(None) => {
                    input_open = false;
                    if self.interactive {
                        break;
                    }
                }
                Event::SocketReady => {
                    if self.drain_replies().await? {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Validates and forwards one command line. `get` and `put` record
    /// the file they refer to before the line goes out, so the matching
    /// `port:` reply can be paired with it later.
    async fn handle_input(&mut self, line: &str) -> Result<()> {
        let args: Vec<&str> = line.split_ascii_whitespace().collect();

        match args.first() {
            Some(&"get") => {
                let Some(path) = args.get(1) else {
                    return self.print("Error: Wrong arguments for get").await;
                };
                // Downloads land in the client's working directory.
                self.downloads.push_back(extract_filename(path).to_string());
            }
            Some(&"put") => {
                if args.len() < 3 {
                    return self.print("Error: Wrong arguments for put").await;
                }
                match fs::metadata(args[1]).await {
                    Ok(metadata) if metadata.is_file() => {
                        self.uploads.push_back(args[1].to_string());
                    }
                    _ => return self.print("Error: Not a file").await,
                }
            }
            _ => {}
        }

        self.stream
            .write_all(format!("{}\n", line).as_bytes())
            .await?;
        Ok(())
    }

    /// Drains every complete reply line currently buffered. Returns
    /// true when the server closed the connection.
    async fn drain_replies(&mut self) -> Result<bool> {
        loop {
            match self.buffer.next_line(&mut self.stream)? {
                (Some(line), _) => self.handle_reply(&line).await?,
                (None, closed) => return Ok(closed),
            }
        }
    }

    async fn handle_reply(&mut self, line: &str) -> Result<()> {
        if let Some(rest) = line.strip_prefix("get port: ") {
            self.start_download(rest);
            return Ok(());
        }
        if let Some(rest) = line.strip_prefix("put port: ") {
            self.start_upload(rest);
            return Ok(());
        }

        // A failed transfer command consumes its pending FIFO entry.
        if line.starts_with("Error: get") {
            self.downloads.pop_front();
        } else if line.starts_with("Error: put") {
            self.uploads.pop_front();
        }

        if !line.is_empty() {
            self.print(line).await?;
        }
        Ok(())
    }

    fn start_download(&mut self, rest: &str) {
        let Some(filename) = self.downloads.pop_front() else {
            warn!("unexpected get reply: {}", rest);
            return;
        };
        let Some((port, size)) = parse_get_reply(rest) else {
            warn!("malformed get reply: {}", rest);
            return;
        };

        let addr = self.server_addr.clone();
        tokio::spawn(async move {
            match File::create(&filename).await {
                Ok(mut file) => {
                    if let Err(e) = transfer::download(&addr, port, size, &mut file).await {
                        warn!("download of {} failed: {}", filename, e);
                    }
                }
                Err(e) => warn!("cannot create {}: {}", filename, e),
            }
        });
    }

    fn start_upload(&mut self, rest: &str) {
        let Some(path) = self.uploads.pop_front() else {
            warn!("unexpected put reply: {}", rest);
            return;
        };
        let Ok(port) = rest.parse::<u16>() else {
            warn!("malformed put reply: {}", rest);
            return;
        };

        let addr = self.server_addr.clone();
        tokio::spawn(async move {
            match File::open(&path).await {
                Ok(mut file) => {
                    if let Err(e) = transfer::upload(&addr, port, &mut file).await {
                        warn!("upload of {} failed: {}", path, e);
                    }
                }
                Err(e) => warn!("cannot open {}: {}", path, e),
            }
        });
    }

    async fn print(&mut self, line: &str) -> Result<()> {
        self.output.write_all(line.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn prompt(&mut self) -> Result<()> {
        self.output.write_all(b"> ").await?;
        self.output.flush().await?;
        Ok(())
    }
}

/// Parses the tail of a `get port: <port> size: <size>` reply.
fn parse_get_reply(rest: &str) -> Option<(u16, u64)> {
    let (port, size) = rest.split_once(" size: ")?;
    Some((port.parse().ok()?, size.parse().ok()?))
}
