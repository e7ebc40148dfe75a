//! Drive a simulated board over an in-process loopback link.
//!
//! Run with: `cargo run -p relaylink --example loopback-board`

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::thread;

    use relaylink::session::{BoardConfig, BoardSimulator, Session};
    use relaylink::transport::RelayStream;

    let (host, device) = RelayStream::pair()?;
    let board = thread::spawn(move || {
        let mut simulator = BoardSimulator::new(1, 16)?;
        simulator.serve(device)?;
        Ok::<_, relaylink::SessionError>(simulator.state())
    });

    let session = Session::from_stream(BoardConfig::new("loopback", 1, 16), host)?;
    println!("open 3 -> {}", session.open_one(3)?);
    println!("flip 12 -> {}", session.flip_one(12)?);
    session.open_one_no_return(16)?;

    let status = session.read_status()?;
    println!("status {status} open={:?}", status.open_circuits());

    session.close();
    let final_state = board.join().map_err(|_| "simulator thread panicked")??;
    println!("board saw {final_state}");
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("the loopback example needs Unix socket pairs");
}
