use anyhow::Result;
use ciak_core::Director;
use ciak_mesh::{NegotiationState, RoomEvent, RoomHandle, RoomSnapshot};
use colored::*;
use dialoguer::Select;
use tokio::sync::mpsc;

const MENU: [&str; 3] = ["Take director role", "Show room", "Leave"];

/// Print room events and drive the interactive menu until the room closes
/// or the user leaves.
pub async fn run(handle: RoomHandle, events: mpsc::Receiver<RoomEvent>) -> Result<()> {
    let mut printer = tokio::spawn(print_events(events));

    loop {
        let choice = tokio::select! {
            choice = prompt() => choice?,
            _ = &mut printer => {
                println!("{}", "Room closed.".yellow());
                return Ok(());
            }
            _ = tokio::signal::ctrl_c() => 2,
        };

        match choice {
            0 => match handle.take_director().await {
                Ok(()) => println!("{}", "You are the director now.".green()),
                Err(e) => println!("{} {}", "Cannot take director role:".red(), e),
            },
            1 => match handle.snapshot().await {
                Ok(snapshot) => print_snapshot(&snapshot),
                Err(e) => println!("{} {}", "Room unavailable:".red(), e),
            },
            _ => {
                println!("{}", "Leaving room...".yellow());
                handle.dispose().await;
                let _ = printer.await;
                return Ok(());
            }
        }
    }
}

async fn prompt() -> Result<usize> {
    let choice = tokio::task::spawn_blocking(|| {
        Select::new()
            .with_prompt("Room")
            .items(&MENU)
            .default(1)
            .interact()
    })
    .await??;
    Ok(choice)
}

async fn print_events(mut events: mpsc::Receiver<RoomEvent>) {
    while let Some(event) = events.recv().await {
        let closed = matches!(event, RoomEvent::Closed { .. });
        print_event(&event);
        if closed {
            break;
        }
    }
}

fn print_event(event: &RoomEvent) {
    match event {
        RoomEvent::SessionOpened { peer_id, descriptor } => {
            println!("{} {} {}", "+".green(), short(peer_id), descriptor);
        }
        RoomEvent::SessionStateChanged { peer_id, state } => {
            println!("  {} {}", short(peer_id), paint_state(*state));
        }
        RoomEvent::PeerLost {
            peer_id,
            descriptor,
            error,
        } => match error {
            Some(e) => println!("{} {} {} ({})", "-".red(), short(peer_id), descriptor, e),
            None => println!("{} {} {}", "-".red(), short(peer_id), descriptor),
        },
        RoomEvent::MeshReady { peers } => {
            println!("{} {} peer(s) connected", "✔ Mesh ready:".green().bold(), peers);
        }
        RoomEvent::DirectorChanged(director) => {
            println!("{} {}", "🎬 Director:".cyan().bold(), paint_director(director));
        }
        RoomEvent::RemoteTrack { peer_id, kind } => {
            println!("  {} receiving {}", short(peer_id), kind);
        }
        RoomEvent::CloseRequested(peer_id) => {
            println!("  {} {}", short(peer_id), "is leaving".yellow());
        }
        RoomEvent::Fatal(reason) => {
            println!("{} {}", "✖ Room failed:".red().bold(), reason);
        }
        RoomEvent::SegmentStarted(segment) => {
            let source = if segment.is_local() { "local camera" } else { "director feed" };
            println!("  {} #{} from {:.1}s", "● Recording".red(), segment.index, segment.start.as_secs_f64());
            println!("    source: {}", source);
        }
        RoomEvent::Closed { segments } => {
            if !segments.is_empty() {
                println!("{} {} segment(s)", "Recorded".bold(), segments.len());
            }
        }
    }
}

fn print_snapshot(snapshot: &RoomSnapshot) {
    let role = if snapshot.is_admin { "admin" } else { "member" };
    println!(
        "{} {} | director: {} | {}/{} established",
        "Room".bold(),
        role,
        paint_director(&snapshot.director),
        snapshot.established(),
        snapshot.sessions.len()
    );

    for session in &snapshot.sessions {
        let video = if session.is_sharing_video { "📹" } else { "  " };
        println!(
            "  {} {} {:<28} {}",
            video,
            short(&session.peer_id),
            session.descriptor.to_string(),
            paint_state(session.state)
        );
    }
}

fn paint_state(state: NegotiationState) -> ColoredString {
    let label = state.to_string();
    match state {
        NegotiationState::Established => label.as_str().green(),
        NegotiationState::Closed => label.as_str().red(),
        _ => label.as_str().yellow(),
    }
}

fn paint_director(director: &Director) -> ColoredString {
    match director {
        Director::Local => "you".green(),
        Director::Remote(peer_id) => short(peer_id).as_str().cyan(),
        Director::Unknown => "unknown".dimmed(),
    }
}

fn short(peer_id: &ciak_core::PeerId) -> String {
    let full = peer_id.to_string();
    full.chars().take(8).collect()
}
