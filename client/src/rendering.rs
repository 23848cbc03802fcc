use macroquad::prelude::*;
use shared::{ActorSnapshot, SlashEffect, MAX_HEALTH, TICK_RATE};

use crate::game::ClientGame;

const BACKGROUND: Color = Color::new(0.1, 0.1, 0.1, 1.0);
const LOCAL_COLOR: Color = Color::new(0.27, 0.8, 0.35, 1.0);
const REMOTE_COLOR: Color = Color::new(1.0, 0.27, 0.27, 1.0);
const SLASH_COLOR: Color = Color::new(1.0, 0.95, 0.6, 1.0);

/// Half-angle of the drawn slash arc.
const SLASH_ARC: f32 = 0.9;

/// What the renderer needs to know about one actor, local or remote.
#[derive(Debug, Clone)]
struct ActorView<'a> {
    x: f32,
    y: f32,
    angle: f32,
    health: u8,
    username: &'a str,
    slash: Option<&'a SlashEffect>,
    chat: &'a str,
}

impl<'a> From<&'a ActorSnapshot> for ActorView<'a> {
    fn from(snapshot: &'a ActorSnapshot) -> Self {
        Self {
            x: snapshot.x,
            y: snapshot.y,
            angle: snapshot.angle,
            health: snapshot.health,
            username: &snapshot.username,
            slash: snapshot.slash.as_ref(),
            chat: &snapshot.chat,
        }
    }
}

pub struct Renderer {
    radius: f32,
}

impl Renderer {
    pub fn new(radius: f32) -> Self {
        Renderer { radius }
    }

    pub fn render(&self, game: &ClientGame, chat_draft: Option<&str>, now_ms: u64) {
        clear_background(BACKGROUND);

        let world = game.world();
        draw_rectangle_lines(0.0, 0.0, world.width, world.height, 2.0, DARKGRAY);

        for (_, snapshot) in game.remotes().iter() {
            if !snapshot.is_alive() {
                continue;
            }
            self.draw_actor(&ActorView::from(snapshot), REMOTE_COLOR, now_ms);
        }

        if !game.is_dead() {
            let actor = game.actor();
            let view = ActorView {
                x: actor.position.x,
                y: actor.position.y,
                angle: actor.angle,
                health: actor.health,
                username: &actor.username,
                slash: actor.slash.as_ref(),
                chat: &actor.chat,
            };
            self.draw_actor(&view, LOCAL_COLOR, now_ms);
        }

        self.draw_hud(game);

        if let Some(countdown) = game.respawn_countdown() {
            self.draw_respawn_overlay(countdown);
        }

        if let Some(draft) = chat_draft {
            self.draw_chat_line(draft);
        }
    }

    fn draw_actor(&self, actor: &ActorView, color: Color, now_ms: u64) {
        draw_circle(actor.x, actor.y, self.radius, color);
        draw_circle_lines(actor.x, actor.y, self.radius, 2.0, WHITE);

        // Facing tick
        let tip_x = actor.x + actor.angle.cos() * self.radius;
        let tip_y = actor.y + actor.angle.sin() * self.radius;
        draw_line(actor.x, actor.y, tip_x, tip_y, 2.0, WHITE);

        if let Some(slash) = actor.slash.filter(|slash| !slash.is_expired(now_ms)) {
            self.draw_slash(slash);
        }

        self.draw_health_bar(actor);

        let name_width = measure_text(actor.username, None, 16, 1.0).width;
        draw_text(
            actor.username,
            actor.x - name_width / 2.0,
            actor.y + self.radius + 16.0,
            16.0,
            LIGHTGRAY,
        );

        if !actor.chat.is_empty() {
            self.draw_chat_bubble(actor);
        }
    }

    fn draw_health_bar(&self, actor: &ActorView) {
        let width = self.radius * 2.0;
        let x = actor.x - self.radius;
        let y = actor.y - self.radius - 12.0;
        let fraction = actor.health as f32 / MAX_HEALTH as f32;

        draw_rectangle(x, y, width, 5.0, Color::from_rgba(60, 60, 60, 255));
        let fill = if fraction > 0.5 {
            GREEN
        } else if fraction > 0.25 {
            YELLOW
        } else {
            RED
        };
        draw_rectangle(x, y, width * fraction, 5.0, fill);
    }

    fn draw_slash(&self, slash: &SlashEffect) {
        let reach = self.radius * 0.8;
        let steps = 8;
        let mut previous = None;

        for i in 0..=steps {
            let t = -SLASH_ARC + 2.0 * SLASH_ARC * i as f32 / steps as f32;
            let angle = slash.angle + t;
            let point = (slash.x + angle.cos() * reach, slash.y + angle.sin() * reach);
            if let Some((px, py)) = previous {
                draw_line(px, py, point.0, point.1, 3.0, SLASH_COLOR);
            }
            previous = Some(point);
        }
    }

    fn draw_chat_bubble(&self, actor: &ActorView) {
        let size = 16;
        let dims = measure_text(actor.chat, None, size, 1.0);
        let padding = 6.0;
        let x = actor.x - dims.width / 2.0 - padding;
        let y = actor.y - self.radius - 24.0 - dims.height - padding * 2.0;

        draw_rectangle(
            x,
            y,
            dims.width + padding * 2.0,
            dims.height + padding * 2.0,
            Color::from_rgba(255, 255, 255, 220),
        );
        draw_text(
            actor.chat,
            x + padding,
            y + padding + dims.offset_y,
            size as f32,
            BLACK,
        );
    }

    fn draw_hud(&self, game: &ClientGame) {
        let connection_color = if game.is_connected() { GREEN } else { RED };
        draw_rectangle(10.0, 10.0, 8.0, 8.0, connection_color);
        draw_text("CON", 22.0, 18.0, 14.0, WHITE);

        let alive = game.remotes().iter().filter(|(_, s)| s.is_alive()).count();
        let players = format!("{} other players", alive);
        draw_text(&players, 10.0, 36.0, 14.0, WHITE);

        let actor = game.actor();
        let cooldowns = format!(
            "slash {:>2}  charge {:>2}",
            actor.slash_cooldown, actor.charge_cooldown
        );
        draw_text(&cooldowns, 10.0, 54.0, 14.0, GRAY);
    }

    fn draw_respawn_overlay(&self, countdown: u32) {
        let (width, height) = (screen_width(), screen_height());
        draw_rectangle(0.0, 0.0, width, height, Color::from_rgba(0, 0, 0, 150));

        let seconds = countdown.div_ceil(TICK_RATE);
        let text = format!("Respawning in {}...", seconds);
        let dims = measure_text(&text, None, 36, 1.0);
        draw_text(
            &text,
            (width - dims.width) / 2.0,
            height / 2.0,
            36.0,
            WHITE,
        );
    }

    fn draw_chat_line(&self, draft: &str) {
        let height = screen_height();
        draw_rectangle(
            0.0,
            height - 32.0,
            screen_width(),
            32.0,
            Color::from_rgba(0, 0, 0, 200),
        );
        draw_text(&format!("> {}_", draft), 10.0, height - 11.0, 18.0, WHITE);
    }
}
