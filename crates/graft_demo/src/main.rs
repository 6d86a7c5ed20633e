//! # graft_demo
//!
//! Walks a small world through the component lifecycle:
//!
//! 1. Run the `arcana` and `vitals` extensions and seal the bootstrap.
//! 2. Spawn actors; each gets the container composed for its class.
//! 3. Tick the server world, then save and reload a container through a tag.
//! 4. Mirror the server state onto a client over the sync transport
//!    (in-process, or NATS when `NATS_URL` is set).
//! 5. Respawn a fallen wizard, carrying components over by copy strategy.

mod actors;
mod config;
mod extensions;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use graft_component::{ComponentContainer, ContainerExt, DenseContainer, Owner, OwnerRef, PeerId, Tag, TickSide, WarnOnce, tag};
use graft_factory::{Bootstrap, CopyFlags, Runtime};
use graft_sync::{LocalTransport, MainLoop, NatsTransport, SyncDispatcher, SyncTransport, TickConfig, channel};
use tracing::info;
use tracing_subscriber::EnvFilter;

use actors::{Actor, CLASSES, PLAYER, WIZARD, ZOMBIE};
use config::DemoConfig;
use extensions::{Arcana, DemoKeys, Vitals};

type World = HashMap<OwnerRef, DenseContainer>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("graft_demo=info".parse()?))
        .init();

    let config = DemoConfig::from_env()?;
    info!(?config, "graft demo starting");

    let mut bootstrap = Bootstrap::<Actor>::new();
    bootstrap.register_classes(&CLASSES);
    bootstrap.run(&[&Arcana, &Vitals])?;
    let runtime = bootstrap.seal()?;
    let keys = DemoKeys::resolve(runtime.registry()).context("demo keys missing after bootstrap")?;

    let actors = [
        Actor::spawn("merlin", &WIZARD),
        Actor::spawn("bob", &PLAYER),
        Actor::spawn("shambler", &ZOMBIE),
    ];
    let merlin = &actors[0];

    let mut server = spawn_world(&runtime, &actors)?;

    // Spend some of merlin's mana so regeneration shows up.
    if let Some(mana) = server.get_mut(&merlin.id).and_then(|c| c.get_mut(&keys.mana)) {
        mana.amount = 40;
    }
    let (bob, shambler) = (&actors[1], &actors[2]);
    if let Some(aggro) = server.get_mut(&shambler.id).and_then(|c| c.get_mut(&keys.aggro)) {
        aggro.target = Some(bob.id);
        info!(hunter = shambler.name, target = ?aggro.target, "zombie picked a target");
    }
    let (server_dispatcher, server_applier) = channel(Arc::clone(runtime.registry()));
    let server_ticks = TickConfig {
        tick_rate: config.tick.tick_rate,
        max_ticks: 5,
    };
    MainLoop::new(server_ticks, TickSide::Server, server_applier)?.run(&mut server);

    save_and_reload(&runtime, merlin, &server)?;

    // Mirror the server onto a client.
    let client_peer = PeerId::new();
    let (client_dispatcher, client_applier) = channel(Arc::clone(runtime.registry()));
    let mut client = spawn_world(&runtime, &actors)?;

    let listener = match &config.nats_url {
        Some(url) => {
            let transport = NatsTransport::connect_to(url).await?;
            let listener = transport.listen(client_peer, client_dispatcher).await?;
            replicate(&transport, &server_dispatcher, &actors, &server, client_peer).await?;
            Some(listener)
        }
        None => {
            let transport = LocalTransport::new();
            transport.attach(client_peer, client_dispatcher);
            replicate(&transport, &server_dispatcher, &actors, &server, client_peer).await?;
            None
        }
    };

    let mut client_loop = MainLoop::new(config.tick.clone(), TickSide::Client, client_applier)?;
    client_loop.run_async(&mut client).await;
    if let Some(listener) = listener {
        listener.abort();
    }

    let mirrored = client.get(&merlin.id).and_then(|c| c.get(&keys.mana));
    let authoritative = server.get(&merlin.id).and_then(|c| c.get(&keys.mana));
    info!(?mirrored, ?authoritative, "client mirror after sync");

    respawn(&runtime, &keys, merlin, &server)?;

    info!("graft demo finished");
    Ok(())
}

fn spawn_world(runtime: &Runtime<Actor>, actors: &[Actor]) -> Result<World> {
    let mut world = World::new();
    for actor in actors {
        let container = runtime.create_container(actor)?;
        info!(
            actor = actor.name,
            class = %actor.owner_class(),
            components = container.len(),
            "spawned"
        );
        world.insert(actor.id, container);
    }
    Ok(world)
}

fn save_and_reload(runtime: &Runtime<Actor>, actor: &Actor, world: &World) -> Result<()> {
    let container = world.get(&actor.id).context("actor has no container")?;
    let mut saved = Tag::new();
    tag::to_tag(container, &mut saved);
    let text = serde_json::to_string(&saved)?;
    info!(actor = actor.name, tag = %text, "saved container");

    let loaded: Tag = serde_json::from_str(&text)?;
    let mut restored = runtime.create_container(actor)?;
    let warnings = WarnOnce::new();
    let applied = tag::from_tag(&mut restored, runtime.registry(), &loaded, &warnings);
    info!(actor = actor.name, applied, "reloaded container");
    Ok(())
}

async fn replicate<T: SyncTransport>(
    transport: &T,
    dispatcher: &SyncDispatcher,
    actors: &[Actor],
    world: &World,
    peer: PeerId,
) -> Result<usize> {
    let mut sent = 0;
    for actor in actors {
        let Some(container) = world.get(&actor.id) else {
            continue;
        };
        for payload in dispatcher.capture_all(actor.id, container, peer)? {
            transport.send(peer, &payload).await?;
            sent += 1;
        }
    }
    info!(sent, %peer, "replicated server state");
    Ok(sent)
}

fn respawn(runtime: &Runtime<Actor>, keys: &DemoKeys, fallen: &Actor, world: &World) -> Result<()> {
    let old = world.get(&fallen.id).context("fallen actor has no container")?;
    let reborn = Actor::spawn(fallen.name.clone(), fallen.owner_class());
    let mut fresh = runtime.create_container(&reborn)?;

    let copied = runtime.copy_components(old, &mut fresh, &reborn, CopyFlags::default())?;
    info!(
        actor = reborn.name,
        copied,
        mana = ?fresh.get(&keys.mana),
        stamina = ?fresh.get(&keys.stamina),
        spellbook = ?fresh.get(&keys.spellbook),
        "respawned"
    );
    Ok(())
}
