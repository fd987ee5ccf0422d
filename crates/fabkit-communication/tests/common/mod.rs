#![allow(dead_code)]

use fabkit_communication::{DeviceSession, SessionConfig, SessionTimeouts};
use fabkit_core::{DeviceDescriptor, DeviceFamily};
use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// What the fake device does in answer to a command
pub enum Action {
    Send(String),
    Sleep(Duration),
}

pub fn send(frame: &str) -> Action {
    Action::Send(frame.to_string())
}

type Responder = Box<dyn FnMut(&str) -> Vec<Action> + Send>;

/// Scripted component on a loopback port
///
/// Accepts one connection per greeting, in order. A greeting that is not a
/// `CNCT` frame is sent and the connection dropped; otherwise every command
/// received is recorded and answered by the responder.
pub struct FakeDevice {
    pub port: u16,
    commands: Arc<Mutex<Vec<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeDevice {
    pub fn spawn<F>(greeting: &str, responder: F) -> Self
    where
        F: FnMut(&str) -> Vec<Action> + Send + 'static,
    {
        Self::with_greetings(&[greeting], responder)
    }

    pub fn with_greetings<F>(greetings: &[&str], responder: F) -> Self
    where
        F: FnMut(&str) -> Vec<Action> + Send + 'static,
    {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let greetings: Vec<String> = greetings.iter().map(|g| g.to_string()).collect();

        let recorded = Arc::clone(&commands);
        let mut responder: Responder = Box::new(responder);
        let handle = thread::spawn(move || {
            for greeting in greetings {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                stream.write_all(format!("{}\r", greeting).as_bytes()).unwrap();
                if !greeting.ends_with(".CNCT") {
                    continue;
                }
                serve(&mut stream, &recorded, &mut responder);
            }
        });

        Self {
            port,
            commands,
            handle: Some(handle),
        }
    }

    /// Commands received so far
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Wait for the device thread to finish (after the client closed)
    pub fn join(mut self) -> Vec<String> {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
        self.commands()
    }
}

fn serve(stream: &mut TcpStream, recorded: &Arc<Mutex<Vec<String>>>, responder: &mut Responder) {
    let mut pending = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        pending.extend_from_slice(&chunk[..n]);

        while let Some(pos) = pending.iter().position(|b| *b == b'\r') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            let command = String::from_utf8_lossy(&line[..line.len() - 1]).to_string();
            recorded.lock().unwrap().push(command.clone());

            for action in responder(&command) {
                match action {
                    Action::Send(frame) => {
                        if stream.write_all(format!("{}\r", frame).as_bytes()).is_err() {
                            return;
                        }
                    }
                    Action::Sleep(duration) => thread::sleep(duration),
                }
            }
        }
    }
}

/// Answer every command with `a<command>:<value>` looked up by verb suffix
pub fn table(entries: &[(&str, &str)]) -> impl FnMut(&str) -> Vec<Action> + Send + 'static {
    let entries: Vec<(String, String)> = entries
        .iter()
        .map(|(command, reply)| (command.to_string(), reply.to_string()))
        .collect();
    move |command: &str| {
        entries
            .iter()
            .find(|(expected, _)| expected == command)
            .map(|(_, reply)| vec![send(reply)])
            .unwrap_or_default()
    }
}

/// Short tiers so failing tests fail fast
pub fn fast_config(port: u16) -> SessionConfig {
    SessionConfig {
        port,
        timeouts: SessionTimeouts {
            connect: Duration::from_secs(2),
            command: Duration::from_millis(400),
            motion: Duration::from_secs(5),
            flash: Duration::from_secs(1),
            retry_backoff: Duration::from_millis(100),
        },
        retries: 1,
    }
}

pub fn descriptor(family: DeviceFamily, type_string: &str, serial: &str) -> DeviceDescriptor {
    DeviceDescriptor::new(Ipv4Addr::LOCALHOST)
        .with_type_string(type_string)
        .with_serial(serial)
        .with_family(family)
}

/// Connected session to a fake device
pub fn connect(device: &FakeDevice, descriptor: DeviceDescriptor) -> DeviceSession {
    let session = DeviceSession::new(descriptor, fast_config(device.port));
    session.connect().unwrap();
    session
}
