use log::warn;
use tokio::sync::mpsc;

/// One outbound Telegram message. Queuing one of these is the whole contract:
/// delivery is best-effort and the sender never learns the outcome.
#[derive(Debug)]
pub struct Outbound {
    pub bot_token: String,
    pub chat_id: String,
    pub text: String,
}

pub fn channel() -> (mpsc::UnboundedSender<Outbound>, mpsc::UnboundedReceiver<Outbound>) {
    mpsc::unbounded_channel()
}

/// Drains the outbound queue. Each message is delivered from its own task so
/// a stalled HTTP call never delays the messages behind it.
pub async fn run(mut rx: mpsc::UnboundedReceiver<Outbound>) {
    let client = reqwest::Client::new();
    while let Some(msg) = rx.recv().await {
        tokio::spawn(send(client.clone(), msg));
    }
}

async fn send(client: reqwest::Client, msg: Outbound) {
    let url = format!("https://api.telegram.org/bot{}/sendMessage", msg.bot_token);
    let params = [
        ("chat_id", msg.chat_id.as_str()),
        ("text", msg.text.as_str()),
        ("parse_mode", "HTML"),
        ("disable_web_page_preview", "true"),
    ];

    match client.post(&url).form(&params).send().await {
        Ok(resp) if resp.status().is_success() => {}
        Ok(resp) => warn!(
            "telegram rejected message for chat {}: status {}",
            msg.chat_id,
            resp.status()
        ),
        Err(e) => warn!("failed to send telegram message to chat {}: {}", msg.chat_id, e),
    }
}
