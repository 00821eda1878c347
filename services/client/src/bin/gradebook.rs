//! services/client/src/bin/gradebook.rs

use client_lib::{
    adapters::{HttpTransport, WsPushChannel},
    auth::sign_in,
    config::Config,
    error::ClientError,
};
use gradebook_core::{RoleGraph, SessionSettings, UserSession};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Signing in to {}", config.api_base_url);

    // --- 2. Initialize Adapters & Sign In ---
    let transport = Arc::new(HttpTransport::new(&config.api_base_url, config.request_timeout)?);
    let (login, password) = config.credentials()?;
    let identity = sign_in(transport.clone(), login, password).await?;

    // --- 3. Open the Session ---
    let settings = SessionSettings {
        push_url: config.push_url.clone(),
        page_size: config.page_size,
        observer_capacity: 256,
    };
    let session = UserSession::open(identity, transport, Arc::new(WsPushChannel::default()), settings).await?;

    // --- 4. Show What the Role Sees ---
    print_overview(session.graph()).await?;

    // --- 5. Tail Notifications Until Ctrl-C ---
    let mut observer = session.subscribe();
    info!("Listening for changes. Press Ctrl-C to sign out.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = session.invalidated() => {
                warn!("The server ended this session.");
                break;
            }
            received = observer.recv() => match received {
                Ok(event) => println!("{}: {:?}", event.name(), event),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} notifications.", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    // --- 6. Sign Out ---
    if let Err(e) = session.sign_out().await {
        warn!("Sign-out did not reach the server: {}", e);
    }
    Ok(())
}

async fn print_overview(graph: &RoleGraph) -> Result<(), ClientError> {
    match graph {
        RoleGraph::Student(student) => {
            let subjects = student.subjects().await?;
            for subject in &subjects {
                println!("{} ({})", subject.name(), subject.teacher_name().unwrap_or("no teacher"));
            }
            if let Some(first) = subjects.first() {
                first.tasks().load_next().await?;
                for task in first.tasks().items() {
                    let mark = if task.is_completed() { "x" } else { " " };
                    println!("  [{}] {}", mark, task.title());
                }
            }
        }
        RoleGraph::Teacher(teacher) => {
            for subject in teacher.subjects().await? {
                println!("{}", subject.name());
                for class in subject.classes().await? {
                    println!("  {} ({} students)", class.name(), class.students_count());
                }
            }
        }
        RoleGraph::Parent(parent) => {
            for child in parent.children().await? {
                let subjects = child.subjects().await?;
                println!("{}: {} subjects", child.full_name(), subjects.len());
            }
        }
        RoleGraph::Administrator(admin) => {
            let users = admin.directory().users();
            users.load_next().await?;
            println!("{} users on the first page", users.len());
        }
    }

    let chats = graph.chats().chats();
    chats.load_next().await?;
    for chat in chats.items() {
        println!("chat: {}", chat.title());
    }
    Ok(())
}
