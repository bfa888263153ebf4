use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::audio::{queue::QueueSnapshot, track::Track};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Mixtape";

/// Embed de "Reproduciendo Ahora"
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Canal", track.uploader.clone(), true)
        .field("⏱️ Duración", format_duration(track.duration_secs), true);

    if let Some(user_id) = track.requested_by {
        embed = embed.field("👤 Solicitado por", format!("<@{}>", user_id), true);
    }

    if let Some(url) = &track.url {
        embed = embed.url(url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de canción agregada a la cola
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**{}**", track))
        .color(colors::SUCCESS_GREEN)
        .field("📊 Posición en cola", position.to_string(), true);

    if track.duration_secs > 0 {
        embed = embed.field("⏱️ Duración", format_duration(track.duration_secs), true);
    }

    if let Some(url) = &track.url {
        embed = embed.url(url);
    }

    embed.footer(CreateEmbedFooter::new(
        "🎵 Se reproducirá automáticamente si no hay música sonando",
    ))
}

/// Embed de colección (playlist/álbum) arrancando con el primer track
pub fn create_collection_started_embed(first: &Track) -> CreateEmbed {
    CreateEmbed::default()
        .title("📋 Colección Iniciada")
        .description(format!(
            "Arrancando con **{}**\nCargando el resto en segundo plano...",
            first
        ))
        .color(colors::MUSIC_PURPLE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de aviso al terminar la carga de una colección
pub fn create_tracks_appended_embed(collection: &str, added: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("✅ Colección Cargada")
        .description(format!(
            "**{}**\nSe agregaron {} canciones más a la cola.",
            collection, added
        ))
        .color(colors::MUSIC_PURPLE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de la cola de reproducción
pub fn create_queue_embed(snapshot: &QueueSnapshot, upcoming: &[String]) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.current.is_none() && snapshot.length == 0 {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    if let Some(current) = &snapshot.current {
        embed = embed.field("▶️ Reproduciendo", format!("**{}**", current), false);
    }

    if !upcoming.is_empty() {
        let list = upcoming
            .iter()
            .enumerate()
            .map(|(i, track)| format!("{}. **{}**", i + 1, track))
            .collect::<Vec<_>>()
            .join("\n");

        embed = embed.field(format!("⏭️ Siguientes ({} en cola)", snapshot.length), list, false);

        if snapshot.length > upcoming.len() {
            embed = embed.field(
                "",
                format!("... y {} canciones más", snapshot.length - upcoming.len()),
                false,
            );
        }
    }

    let mut modes = Vec::new();
    if snapshot.shuffle_mode {
        modes.push("🔀 aleatorio");
    }
    if snapshot.loop_mode {
        modes.push("🔁 repetición");
    }
    if !modes.is_empty() {
        embed = embed.field("⚙️ Modos", modes.join(" · "), false);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de ayuda con todos los comandos
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Comandos de Mixtape")
        .color(colors::INFO_BLUE)
        .field("/play <búsqueda o URL>", "Reproduce desde YouTube o Spotify", false)
        .field("/skip", "Salta a la siguiente canción", false)
        .field("/pause · /resume", "Pausa o reanuda la reproducción", false)
        .field("/stop", "Detiene todo, limpia la cola y desconecta", false)
        .field("/queue", "Muestra la cola de reproducción", false)
        .field("/clear", "Limpia la cola", false)
        .field("/shuffle", "Activa/desactiva el modo aleatorio", false)
        .field("/nowplaying", "Muestra la canción actual", false)
        .field("/join · /leave", "Conecta o desconecta el bot del canal de voz", false)
        .field(
            "🎧 Fuentes",
            "• **YouTube**: URLs y búsqueda por texto\n• **Spotify**: tracks, playlists y álbumes públicos",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Formatea segundos como MM:SS (o HH:MM:SS para temas largos).
pub fn format_duration(secs: u64) -> String {
    if secs == 0 {
        return "desconocida".to_string();
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
