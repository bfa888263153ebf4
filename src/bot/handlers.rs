use std::sync::Arc;

use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info};

use crate::{
    audio::{
        player::{GuildPlayer, PlayerError, PlayerState},
        queue::QueueError,
        track::Track,
    },
    bot::MixtapeBot,
    sources::{
        ingest::{self, CollectionKind},
        spotify::{self, CatalogRef},
        ytdlp, CatalogError,
    },
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, command, bot, guild_id).await?,
        "clear" => handle_clear(ctx, command, bot, guild_id).await?,
        "shuffle" => handle_shuffle(ctx, command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, command, bot, guild_id).await?,
        "join" => handle_join(ctx, command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, command, bot, guild_id).await?,
        "help" => handle_help(ctx, command).await?,
        _ => {
            respond_text(ctx, &command, "❌ Comando no reconocido").await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer: resolver puede tomar varios segundos
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let voice_channel_id = match get_user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => channel_id,
        Err(_) => {
            return edit_text(ctx, &command, "❌ Debes estar en un canal de voz").await;
        }
    };

    let manager = bot.manager()?;
    let player = manager.get_or_create(guild_id);

    if let Err(PlayerError::Connection(reason)) = player.connect(voice_channel_id).await {
        error!("Error al conectar en guild {}: {}", guild_id, reason);
        return edit_text(ctx, &command, "❌ No se pudo conectar al canal de voz").await;
    }

    // Los anuncios de "reproduciendo ahora" van al canal del comando
    bot.notifier()?.bind(guild_id, command.channel_id);

    if let Some(reference) = spotify::parse_catalog_ref(&query) {
        handle_catalog_play(ctx, &command, bot, player, reference, command.user.id).await
    } else {
        handle_media_play(ctx, &command, bot, player, &query, command.user.id).await
    }
}

/// Búsqueda de texto o URL directa: se resuelve al encolar.
async fn handle_media_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MixtapeBot,
    player: Arc<GuildPlayer>,
    query: &str,
    user_id: UserId,
) -> Result<()> {
    let reference = if ytdlp::is_media_url(query) {
        query.to_string()
    } else {
        ytdlp::search_reference(query)
    };

    let info = match bot.resolver.resolve(&reference).await {
        Ok(info) => info,
        Err(e) => {
            info!("Sin resultados para '{}': {}", query, e);
            return edit_text(ctx, command, "❌ No se encontró el contenido pedido").await;
        }
    };

    let track = Track::from_media_url(
        info.title,
        info.url,
        info.uploader.unwrap_or_else(|| "Desconocido".to_string()),
        info.duration_secs.unwrap_or(0),
    )
    .with_requested_by(user_id);

    match player.enqueue(track.clone()) {
        Ok(position) => {
            let embed = embeds::create_track_added_embed(&track, position);
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            maybe_start_playback(&player).await;
        }
        Err(QueueError::Full(max)) => {
            edit_text(ctx, command, &format!("❌ La cola está llena (máximo {})", max)).await?;
        }
    }

    Ok(())
}

/// Referencias de Spotify: track directo, o colección con ingesta en
/// segundo plano (el primer track arranca ya, el resto llega después).
async fn handle_catalog_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MixtapeBot,
    player: Arc<GuildPlayer>,
    reference: CatalogRef,
    user_id: UserId,
) -> Result<()> {
    match reference {
        CatalogRef::Track(id) => match bot.catalog.get_track(&id).await {
            Ok(catalog_track) => {
                let track = Track::from_catalog(
                    catalog_track.name,
                    catalog_track.artist,
                    Some(user_id),
                );
                enqueue_and_report(ctx, command, &player, track).await?;
            }
            Err(e) => {
                edit_text(ctx, command, catalog_error_message(&e)).await?;
            }
        },

        CatalogRef::Playlist(id) => match bot.catalog.first_playlist_track(&id).await {
            Ok(Some(stub)) => {
                let first = Track::from_catalog(stub.name, stub.artist, Some(user_id));

                match player.enqueue(first.clone()) {
                    Ok(_) => {
                        let embed = embeds::create_collection_started_embed(&first);
                        command
                            .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                            .await?;
                        maybe_start_playback(&player).await;

                        ingest::spawn_collection_ingest(
                            player,
                            bot.catalog.clone(),
                            bot.notifier()?,
                            CollectionKind::Playlist,
                            id,
                            Some(user_id),
                        );
                    }
                    Err(QueueError::Full(max)) => {
                        edit_text(ctx, command, &format!("❌ La cola está llena (máximo {})", max))
                            .await?;
                    }
                }
            }
            Ok(None) => {
                edit_text(ctx, command, "❌ La playlist está vacía").await?;
            }
            Err(e) => {
                edit_text(ctx, command, catalog_error_message(&e)).await?;
            }
        },

        CatalogRef::Album(id) => match bot.catalog.get_album(&id).await {
            Ok((meta, mut stubs)) => {
                if stubs.is_empty() {
                    return edit_text(ctx, command, "❌ El álbum está vacío").await;
                }

                let first_stub = stubs.remove(0);
                let first = Track::from_catalog(first_stub.name, first_stub.artist, Some(user_id));

                match player.enqueue(first.clone()) {
                    Ok(_) => {
                        let embed = embeds::create_collection_started_embed(&first);
                        command
                            .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                            .await?;
                        maybe_start_playback(&player).await;

                        // El álbum ya vino completo; el resto se anexa sin
                        // volver a consultar el catálogo.
                        ingest::spawn_stub_append(
                            player,
                            bot.notifier()?,
                            meta.name,
                            stubs,
                            Some(user_id),
                        );
                    }
                    Err(QueueError::Full(max)) => {
                        edit_text(ctx, command, &format!("❌ La cola está llena (máximo {})", max))
                            .await?;
                    }
                }
            }
            Err(e) => {
                edit_text(ctx, command, catalog_error_message(&e)).await?;
            }
        },
    }

    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let paused = match bot.manager()?.get(guild_id) {
        Some(player) => player.pause().await,
        None => false,
    };

    let message = if paused {
        "⏸️ Reproducción pausada"
    } else {
        "❌ No hay nada reproduciéndose"
    };

    respond_text(ctx, &command, message).await
}

async fn handle_resume(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let resumed = match bot.manager()?.get(guild_id) {
        Some(player) => player.resume().await,
        None => false,
    };

    let message = if resumed {
        "▶️ Reproducción reanudada"
    } else {
        "❌ No hay nada pausado"
    };

    respond_text(ctx, &command, message).await
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let skipped = match bot.manager()?.get(guild_id) {
        Some(player) => player.skip().await,
        None => false,
    };

    let message = if skipped {
        "⏭️ Saltando a la siguiente canción"
    } else {
        "❌ No hay nada que saltar"
    };

    respond_text(ctx, &command, message).await
}

async fn handle_stop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let manager = bot.manager()?;

    let Some(player) = manager.get(guild_id) else {
        return respond_text(ctx, &command, "❌ No estoy conectado a un canal de voz").await;
    };

    player.halt().await;
    let cleared = player.clear_queue();
    manager.remove(guild_id).await;

    respond_text(
        ctx,
        &command,
        &format!("⏹️ Reproducción detenida. Se limpiaron {} canciones de la cola.", cleared),
    )
    .await
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.manager()?.get(guild_id) else {
        return respond_text(ctx, &command, "📭 La cola está vacía").await;
    };

    let snapshot = player.queue_snapshot();
    let upcoming = player.upcoming(10);
    let embed = embeds::create_queue_embed(&snapshot, &upcoming);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;

    Ok(())
}

async fn handle_clear(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let cleared = bot
        .manager()?
        .get(guild_id)
        .map(|player| player.clear_queue())
        .unwrap_or(0);

    let message = if cleared > 0 {
        format!("🗑️ Se limpiaron {} canciones de la cola", cleared)
    } else {
        "📭 La cola ya está vacía".to_string()
    };

    respond_text(ctx, &command, &message).await
}

async fn handle_shuffle(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let player = bot.manager()?.get_or_create(guild_id);

    let message = if player.toggle_shuffle() {
        "🔀 Modo aleatorio activado"
    } else {
        "➡️ Modo aleatorio desactivado"
    };

    respond_text(ctx, &command, message).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let current = match bot.manager()?.get(guild_id) {
        Some(player) => {
            let state = player.state().await;
            if matches!(state, PlayerState::Playing | PlayerState::Paused) {
                player.current_track()
            } else {
                None
            }
        }
        None => None,
    };

    match current {
        Some(track) => {
            let embed = embeds::create_now_playing_embed(&track);
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().embed(embed),
                    ),
                )
                .await?;
            Ok(())
        }
        None => respond_text(ctx, &command, "❌ No hay nada reproduciéndose actualmente").await,
    }
}

async fn handle_join(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let voice_channel_id = match get_user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => channel_id,
        Err(_) => {
            return respond_text(ctx, &command, "❌ Debes estar en un canal de voz").await;
        }
    };

    let player = bot.manager()?.get_or_create(guild_id);

    match player.connect(voice_channel_id).await {
        Ok(()) => respond_text(ctx, &command, "🔊 Conectado al canal de voz").await,
        Err(e) => {
            error!("Error al conectar en guild {}: {}", guild_id, e);
            respond_text(ctx, &command, "❌ No se pudo conectar al canal de voz").await
        }
    }
}

async fn handle_leave(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let message = if bot.manager()?.remove(guild_id).await {
        "👋 Desconectado del canal de voz"
    } else {
        "❌ No estoy conectado a un canal de voz"
    };

    respond_text(ctx, &command, message).await
}

async fn handle_help(ctx: &Context, command: CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_help_embed())
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

async fn enqueue_and_report(
    ctx: &Context,
    command: &CommandInteraction,
    player: &Arc<GuildPlayer>,
    track: Track,
) -> Result<()> {
    match player.enqueue(track.clone()) {
        Ok(position) => {
            let embed = embeds::create_track_added_embed(&track, position);
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            maybe_start_playback(player).await;
        }
        Err(QueueError::Full(max)) => {
            edit_text(ctx, command, &format!("❌ La cola está llena (máximo {})", max)).await?;
        }
    }

    Ok(())
}

/// Arranca la reproducción solo si el player está conectado y ocioso.
async fn maybe_start_playback(player: &Arc<GuildPlayer>) {
    if player.state().await == PlayerState::Connected {
        if let Err(e) = player.play_next().await {
            error!("Error al iniciar reproducción en guild {}: {}", player.guild_id(), e);
        }
    }
}

fn catalog_error_message(error: &CatalogError) -> &'static str {
    match error {
        CatalogError::NotFound => "❌ No se encontró ese contenido en Spotify",
        CatalogError::AccessDenied => {
            "🔒 Spotify denegó el acceso: solo se pueden cargar tracks, playlists y álbumes públicos"
        }
        CatalogError::Disabled => "❌ La integración con Spotify no está configurada",
        CatalogError::Upstream(_) => "❌ Spotify no respondió; intentá de nuevo en un rato",
    }
}

async fn respond_text(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(text),
            ),
        )
        .await?;

    Ok(())
}

/// Responde a una interacción ya deferida.
async fn edit_text(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(text))
        .await?;

    Ok(())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))?;

    Ok(channel_id)
}
