//! Inline-keyboard chat surface of the booking wizard.
//!
//! Every chat gets one wizard session behind a mutex; callbacks lock it,
//! feed one event to the controller, and redraw the active screen in place
//! by editing the menu message. Validation failures surface as callback
//! alerts and leave the screen as it was.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, InlineKeyboardMarkup, MessageId};
use tokio::sync::Mutex;

use crate::backend::types::CleaningStatus;
use crate::backend::{HttpBackend, LocalBackend};
use crate::booking::availability;
use crate::booking::state::{WizardEvent, WizardStep};
use crate::booking::wizard::{
    BookingWizard, CancelOutcome, RescheduleStart, SubmissionOutcome, WizardConfig,
};
use crate::booking::TariffCatalog;
use crate::bridge::TelegramBridge;
use crate::storage::db::{self, DbPool};
use crate::telegram::{cb, webapp_auth, Bot};

type Session = Arc<Mutex<BookingWizard>>;

/// Shared context of the chat surface.
pub struct BotContext {
    pub db_pool: Arc<DbPool>,
    pub config: WizardConfig,
    sessions: DashMap<ChatId, Session>,
}

impl BotContext {
    pub fn new(db_pool: Arc<DbPool>, config: WizardConfig) -> Self {
        Self {
            db_pool,
            config,
            sessions: DashMap::new(),
        }
    }

    /// The wizard session of a chat, created on first use.
    ///
    /// With `API_BASE_URL` set the session talks to the remote booking
    /// backend; otherwise it is served from the local sqlite store.
    pub fn session(&self, bot: &Bot, chat_id: ChatId) -> Session {
        self.sessions
            .entry(chat_id)
            .or_insert_with(|| {
                let backend: Arc<dyn crate::backend::BackendApi> = match &*crate::core::config::API_BASE_URL {
                    Some(base) => Arc::new(HttpBackend::new(base.clone(), self.remote_credentials(chat_id))),
                    None => Arc::new(LocalBackend::new((*self.db_pool).clone(), chat_id.0)),
                };
                let bridge = TelegramBridge::new(bot.clone(), chat_id);
                Arc::new(Mutex::new(BookingWizard::new(backend, Arc::new(bridge), self.config)))
            })
            .clone()
    }

    /// Init data signed with the bot token for the chat user, so the remote
    /// backend authenticates bot-originated calls exactly like Mini App
    /// requests.
    fn remote_credentials(&self, chat_id: ChatId) -> String {
        let stored = db::get_connection(&self.db_pool)
            .ok()
            .and_then(|conn| db::get_user(&conn, chat_id.0).ok().flatten());
        let user = webapp_auth::WebAppUser {
            id: chat_id.0,
            first_name: stored.as_ref().and_then(|u| u.first_name.clone()),
            username: stored.as_ref().and_then(|u| u.username.clone()),
        };
        match webapp_auth::sign_init_data(&crate::core::config::BOT_TOKEN, &user) {
            Ok(init_data) => init_data,
            Err(e) => {
                log::error!("Failed to sign init data for {}: {}", chat_id, e);
                String::new()
            }
        }
    }
}

fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

const MONTHS_RU: [&str; 12] = [
    "Январь",
    "Февраль",
    "Март",
    "Апрель",
    "Май",
    "Июнь",
    "Июль",
    "Август",
    "Сентябрь",
    "Октябрь",
    "Ноябрь",
    "Декабрь",
];

fn format_date_ru(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (next, NaiveDate::from_ymd_opt(year, month, 1)) {
        (Some(next), Some(first)) => (next - first).num_days() as u32,
        _ => 30,
    }
}

// ============================================================================
// SCREEN RENDERING
// ============================================================================

fn render_main(wizard: &BookingWizard) -> (String, InlineKeyboardMarkup) {
    let mut text = "🧹 Чистоклин — уборка по подписке\n\nВыберите действие:".to_string();
    if let Some(next) = wizard.cleanings().next_cleaning(now_local()) {
        text = format!(
            "🧹 Чистоклин — уборка по подписке\n\n📅 Следующая уборка: {}\n\nВыберите действие:",
            next.scheduled_at.format("%d.%m.%Y в %H:%M")
        );
    }
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![cb("🗓 Запланировать уборку", "wiz:start")],
        vec![cb("📋 Мои уборки", "wiz:my")],
        vec![cb("💳 Продлить подписку", "wiz:extend")],
        vec![cb("💬 Чат с поддержкой", "wiz:support")],
    ]);
    (text, keyboard)
}

fn render_tariffs(catalog: &TariffCatalog) -> (String, InlineKeyboardMarkup) {
    if catalog.is_empty() {
        let keyboard = InlineKeyboardMarkup::new(vec![vec![cb("⬅️ Назад", "wiz:back")]]);
        return (
            "⚠️ Тарифы сейчас недоступны, попробуйте позже.".to_string(),
            keyboard,
        );
    }
    let mut text = String::from("Выберите тариф:\n");
    let mut rows = Vec::new();
    for tariff in catalog.all() {
        text.push_str(&format!(
            "\n💎 {} — {} ₽/мес\n",
            tariff.display_name, tariff.monthly_price
        ));
        for feature in &tariff.features {
            text.push_str(&format!("  • {}\n", feature));
        }
        rows.push(vec![cb(
            format!("{} — {} ₽", tariff.display_name, tariff.monthly_price),
            format!("wiz:tariff:{}", tariff.id),
        )]);
    }
    rows.push(vec![cb("⬅️ Назад", "wiz:back")]);
    (text, InlineKeyboardMarkup::new(rows))
}

/// Calendar grid for one month page. Unavailable days render as dots that
/// answer with a no-op.
fn render_calendar(wizard: &BookingWizard, year: i32, month: u32) -> (String, InlineKeyboardMarkup) {
    let now = now_local();
    let booked = wizard.cleanings().booked_dates();
    let min = availability::min_bookable_date(now, wizard.rules());
    let max = availability::max_bookable_date(now, wizard.rules());

    let month_name = MONTHS_RU.get(month as usize - 1).unwrap_or(&"");
    let text = format!("Выберите дату уборки:\n\n🗓 {} {}", month_name, year);

    let mut rows: Vec<Vec<teloxide::types::InlineKeyboardButton>> = Vec::new();
    rows.push(
        ["Пн", "Вт", "Ср", "Чт", "Пт", "Сб", "Вс"]
            .iter()
            .map(|d| cb(*d, "noop"))
            .collect(),
    );

    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(now.date());
    let offset = first.weekday().num_days_from_monday();
    let total = days_in_month(year, month);

    let mut week: Vec<teloxide::types::InlineKeyboardButton> = Vec::new();
    for _ in 0..offset {
        week.push(cb(" ", "noop"));
    }
    for day in 1..=total {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let available = availability::check_date(date, now, &booked, wizard.rules()).is_ok();
            if available {
                week.push(cb(day.to_string(), format!("wiz:date:{}", date.format("%Y-%m-%d"))));
            } else {
                week.push(cb("·", "noop"));
            }
        }
        if week.len() == 7 {
            rows.push(std::mem::take(&mut week));
        }
    }
    if !week.is_empty() {
        while week.len() < 7 {
            week.push(cb(" ", "noop"));
        }
        rows.push(week);
    }

    // Month paging, clamped to the bookable window
    let mut nav = Vec::new();
    let this_page = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(now.date());
    if this_page > NaiveDate::from_ymd_opt(min.year(), min.month(), 1).unwrap_or(min) {
        let prev = this_page - Duration::days(1);
        nav.push(cb("◀️", format!("wiz:page:{}", prev.format("%Y-%m"))));
    }
    let beyond = max.map(|m| {
        (this_page.year() == m.year() && this_page.month() == m.month()) || this_page > m
    });
    if beyond != Some(true) {
        let next = this_page + Duration::days(i64::from(total));
        nav.push(cb("▶️", format!("wiz:page:{}", next.format("%Y-%m"))));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }
    rows.push(vec![cb("⬅️ Назад", "wiz:back")]);

    (text, InlineKeyboardMarkup::new(rows))
}

fn render_time(wizard: &BookingWizard) -> (String, InlineKeyboardMarkup) {
    let date = wizard.state().selection.date;
    let text = match date {
        Some(d) => format!("Дата: {}\n\nВыберите время:", format_date_ru(d)),
        None => "Выберите время:".to_string(),
    };
    let mut rows = Vec::new();
    for slots in availability::time_slots().chunks(3) {
        rows.push(
            slots
                .iter()
                .map(|&t| {
                    let label = availability::slot_label(t);
                    cb(format!("🕐 {}", label), format!("wiz:time:{}", label))
                })
                .collect(),
        );
    }
    rows.push(vec![cb("⬅️ Назад", "wiz:back")]);
    (text, InlineKeyboardMarkup::new(rows))
}

fn render_confirm(wizard: &BookingWizard, catalog: &TariffCatalog) -> (String, InlineKeyboardMarkup) {
    let selection = &wizard.state().selection;
    let tariff_line = selection
        .tariff
        .and_then(|id| catalog.get(id))
        .map(|t| format!("Тариф: {} — {} ₽/мес\n", t.display_name, t.monthly_price))
        .unwrap_or_default();
    let date_line = selection.date.map(format_date_ru).unwrap_or_default();
    let time_line = selection
        .time
        .map(availability::slot_label)
        .unwrap_or_default();

    let text = format!(
        "Подтвердите запись:\n\n{}Дата: {}\nВремя: {}",
        tariff_line, date_line, time_line
    );
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![cb("✅ Подтвердить", "wiz:confirm")],
        vec![cb("✏️ Изменить", "wiz:edit"), cb("⬅️ Назад", "wiz:back")],
    ]);
    (text, keyboard)
}

fn render_cleanings(wizard: &BookingWizard) -> (String, InlineKeyboardMarkup) {
    let records = wizard.cleanings().all();
    let mut rows = Vec::new();
    let text = if records.is_empty() {
        "У вас пока нет уборок.".to_string()
    } else {
        let mut text = String::from("📋 Ваши уборки:\n");
        for record in records {
            let icon = match record.status {
                CleaningStatus::Scheduled => "📅",
                CleaningStatus::Completed => "✅",
                CleaningStatus::Cancelled => "❌",
            };
            text.push_str(&format!(
                "\n{} {} — {}\n",
                icon,
                record.scheduled_at.format("%d.%m.%Y %H:%M"),
                record.status.display_ru()
            ));
            if record.status == CleaningStatus::Scheduled {
                rows.push(vec![
                    cb(
                        format!("🔄 Перенести {}", record.scheduled_at.format("%d.%m")),
                        format!("cl:resched:{}", record.id),
                    ),
                    cb(
                        format!("❌ Отменить {}", record.scheduled_at.format("%d.%m")),
                        format!("cl:cancel:{}", record.id),
                    ),
                ]);
            }
        }
        text
    };
    rows.push(vec![cb("⬅️ Назад", "wiz:back")]);
    (text, InlineKeyboardMarkup::new(rows))
}

/// Draws the wizard's active screen.
async fn render_step(wizard: &BookingWizard) -> (String, InlineKeyboardMarkup) {
    match wizard.state().step {
        WizardStep::Main => render_main(wizard),
        WizardStep::Tariff => {
            let catalog = wizard.load_catalog().await;
            render_tariffs(&catalog)
        }
        WizardStep::Date => {
            let min = availability::min_bookable_date(now_local(), wizard.rules());
            render_calendar(wizard, min.year(), min.month())
        }
        WizardStep::Time => render_time(wizard),
        WizardStep::Confirm => {
            let catalog = wizard.load_catalog().await;
            render_confirm(wizard, &catalog)
        }
        WizardStep::MyCleanings => render_cleanings(wizard),
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Shows the main menu as a fresh message.
pub async fn show_main_menu(bot: &Bot, chat_id: ChatId, ctx: Arc<BotContext>) -> ResponseResult<Message> {
    let session = ctx.session(bot, chat_id);
    let mut wizard = session.lock().await;
    if let Err(e) = wizard.refresh_cleanings().await {
        log::error!("Failed to refresh cleanings for {}: {}", chat_id, e);
    }
    let (text, keyboard) = render_main(&wizard);
    bot.send_message(chat_id, text).reply_markup(keyboard).await
}

/// Shows the cleanings list as a fresh message (the /cleanings command).
pub async fn show_cleanings(bot: &Bot, chat_id: ChatId, ctx: Arc<BotContext>) -> ResponseResult<Message> {
    let session = ctx.session(bot, chat_id);
    let mut wizard = session.lock().await;
    if let Err(e) = wizard.refresh_cleanings().await {
        log::error!("Failed to refresh cleanings for {}: {}", chat_id, e);
    }
    // Navigate the session there too so back buttons behave
    let _ = wizard.handle_event(WizardEvent::OpenMyCleanings, now_local());
    let (text, keyboard) = render_cleanings(&wizard);
    bot.send_message(chat_id, text).reply_markup(keyboard).await
}

async fn redraw(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    wizard: &BookingWizard,
) -> ResponseResult<()> {
    let (text, keyboard) = render_step(wizard).await;
    bot.edit_message_text(chat_id, message_id, text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn alert(bot: &Bot, callback_id: CallbackQueryId, text: String) -> ResponseResult<()> {
    bot.answer_callback_query(callback_id)
        .text(text)
        .show_alert(true)
        .await?;
    Ok(())
}

/// Maps pure navigation callbacks to wizard events. Action callbacks
/// (confirm, cancel, reschedule, paging) are handled separately.
fn nav_event(data: &str) -> Option<WizardEvent> {
    match data {
        "wiz:start" => Some(WizardEvent::StartScheduling),
        "wiz:my" => Some(WizardEvent::OpenMyCleanings),
        "wiz:back" => Some(WizardEvent::Back),
        "wiz:edit" => Some(WizardEvent::Edit),
        _ if data.starts_with("wiz:tariff:") => data
            .strip_prefix("wiz:tariff:")
            .and_then(crate::backend::types::TariffId::parse)
            .map(WizardEvent::TariffChosen),
        _ if data.starts_with("wiz:date:") => data
            .strip_prefix("wiz:date:")
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(WizardEvent::DateChosen),
        _ if data.starts_with("wiz:time:") => data
            .strip_prefix("wiz:time:")
            .and_then(availability::parse_slot)
            .map(WizardEvent::TimeChosen),
        _ => None,
    }
}

/// Routes every `wiz:` and `cl:` callback of the booking menus.
pub async fn handle_menu_callback(bot: Bot, q: CallbackQuery, ctx: Arc<BotContext>) -> ResponseResult<()> {
    let callback_id = q.id.clone();
    let data = match q.data {
        Some(data) => data,
        None => return Ok(()),
    };
    let chat_id = q.message.as_ref().map(|m| m.chat().id);
    let message_id = q.message.as_ref().map(|m| m.id());
    let (chat_id, message_id) = match (chat_id, message_id) {
        (Some(c), Some(m)) => (c, m),
        _ => return Ok(()),
    };

    if data == "noop" {
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    }

    let session = ctx.session(&bot, chat_id);
    let mut wizard = session.lock().await;
    let now = now_local();

    // Navigation events first
    if let Some(event) = nav_event(&data) {
        if data == "wiz:my" {
            if let Err(e) = wizard.refresh_cleanings().await {
                log::error!("Failed to refresh cleanings for {}: {}", chat_id, e);
            }
        }
        match wizard.handle_event(event, now) {
            Ok(()) => {
                bot.answer_callback_query(callback_id).await?;
                redraw(&bot, chat_id, message_id, &wizard).await?;
            }
            Err(e) => alert(&bot, callback_id, e.to_string()).await?,
        }
        return Ok(());
    }

    match data.as_str() {
        "wiz:confirm" => {
            if wizard.is_busy() {
                return alert(&bot, callback_id, "Запись уже выполняется, подождите".to_string()).await;
            }
            match wizard.confirm().await {
                Ok(SubmissionOutcome::Success) => {
                    bot.answer_callback_query(callback_id)
                        .text("✅ Уборка записана!")
                        .await?;
                    redraw(&bot, chat_id, message_id, &wizard).await?;
                }
                Ok(SubmissionOutcome::Failed(msg)) => {
                    // Screen and selection stay put for a retry
                    alert(&bot, callback_id, format!("⚠️ Не получилось: {}", msg)).await?;
                }
                Ok(SubmissionOutcome::Stale) => {
                    bot.answer_callback_query(callback_id).await?;
                }
                Err(e) => alert(&bot, callback_id, e.to_string()).await?,
            }
        }
        "wiz:extend" => {
            // Payments are handled off-platform for now
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(
                chat_id,
                "💳 Продлить подписку можно по телефону +7 (900) 123-45-67 или через поддержку: @chistoclean_support",
            )
            .await?;
        }
        "wiz:support" => {
            if let Err(e) = wizard.open_support().await {
                log::error!("Support handoff failed: {}", e);
            }
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(chat_id, "💬 Напишите нам: @chistoclean_support").await?;
        }
        _ if data.starts_with("wiz:page:") => {
            let page = data
                .strip_prefix("wiz:page:")
                .and_then(|s| NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok());
            bot.answer_callback_query(callback_id).await?;
            if let Some(page) = page {
                let (text, keyboard) = render_calendar(&wizard, page.year(), page.month());
                bot.edit_message_text(chat_id, message_id, text)
                    .reply_markup(keyboard)
                    .await?;
            }
        }
        _ if data.starts_with("cl:cancel:") => {
            // Two-tap confirmation: swap the row for an explicit yes/no
            let id = data.trim_start_matches("cl:cancel:");
            let date = wizard
                .cleanings()
                .get(id)
                .map(|r| r.scheduled_at.format("%d.%m.%Y в %H:%M").to_string());
            bot.answer_callback_query(callback_id).await?;
            if let Some(date) = date {
                let keyboard = InlineKeyboardMarkup::new(vec![vec![
                    cb("❌ Да, отменить", format!("cl:cancel2:{}", id)),
                    cb("Нет", "wiz:my"),
                ]]);
                bot.edit_message_text(chat_id, message_id, format!("Отменить уборку {}?", date))
                    .reply_markup(keyboard)
                    .await?;
            }
        }
        _ if data.starts_with("cl:cancel2:") => {
            let id = data.trim_start_matches("cl:cancel2:").to_string();
            match wizard.cancel_cleaning(&id).await {
                Ok(CancelOutcome::Cancelled) => {
                    bot.answer_callback_query(callback_id)
                        .text("Уборка отменена")
                        .await?;
                }
                Ok(CancelOutcome::Declined) => {
                    bot.answer_callback_query(callback_id).await?;
                }
                Err(e) => alert(&bot, callback_id, e.to_string()).await?,
            }
            let (text, keyboard) = render_cleanings(&wizard);
            bot.edit_message_text(chat_id, message_id, text)
                .reply_markup(keyboard)
                .await?;
        }
        _ if data.starts_with("cl:resched:") => {
            let id = data.trim_start_matches("cl:resched:").to_string();
            match wizard.start_reschedule(&id, now) {
                Ok(RescheduleStart::Subflow) => {
                    bot.answer_callback_query(callback_id).await?;
                    redraw(&bot, chat_id, message_id, &wizard).await?;
                }
                Ok(RescheduleStart::Guidance) => {
                    alert(
                        &bot,
                        callback_id,
                        "Чтобы перенести уборку, отмените её и запишитесь на новую дату".to_string(),
                    )
                    .await?;
                }
                Err(e) => alert(&bot, callback_id, e.to_string()).await?,
            }
        }
        _ => {
            log::warn!("Unknown callback data: {}", data);
            bot.answer_callback_query(callback_id).await?;
        }
    }

    Ok(())
}
