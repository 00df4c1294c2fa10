use std::path::PathBuf;

use anyhow::Context;
use mentesana_core::config::AppConfig;
use mentesana_core::types::TurnOrigin;
use mentesana_engine::orchestrator::ChatOrchestrator;
use mentesana_runtime::config_store::ConfigStore;
use mentesana_runtime::runtime_chat::{ServiceKeys, build_chat_from_config};
use mentesana_runtime::secrets::{SecretKey, delete_secret, set_secret};
use tokio::io::{AsyncBufReadExt, BufReader};

const USAGE: &str = "uso:\n  mentesana-cli [CONFIG]\n  mentesana-cli set-key <llm|elevenlabs> <VALOR>\n  mentesana-cli delete-key <llm|elevenlabs>";

const HELP: &str = "/record empezar o terminar una grabación\n/retry  reenviar el último mensaje\n/clear  borrar la conversación\n/speak  leer en voz alta la última respuesta\n/quit   salir";

fn config_path(arg: Option<&str>) -> PathBuf {
    arg.map(PathBuf::from)
        .or_else(|| std::env::var_os("MENTESANA_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("mentesana.json"))
}

fn print_outcome(chat: &ChatOrchestrator, turns_before: usize) {
    let snap = chat.snapshot();
    for turn in snap.turns.iter().skip(turns_before) {
        match turn.origin {
            TurnOrigin::User if turn.is_voice => println!("tú (voz)> {}", turn.content),
            TurnOrigin::User => {}
            TurnOrigin::Assistant => println!("asistente> {}", turn.content),
        }
    }
    if let Some(err) = &snap.error {
        println!("error> {err}");
    }
}

#[cfg(feature = "audio-io")]
fn build_chat(cfg: &AppConfig, keys: &ServiceKeys) -> anyhow::Result<ChatOrchestrator> {
    build_chat_from_config(cfg, keys, mentesana_runtime::cpal_device::CpalAudioDevice::new())
}

#[cfg(not(feature = "audio-io"))]
fn build_chat(cfg: &AppConfig, keys: &ServiceKeys) -> anyhow::Result<ChatOrchestrator> {
    build_chat_from_config(cfg, keys, mentesana_runtime::voice::NoAudioDevice)
}

async fn run_chat(config_arg: Option<&str>) -> anyhow::Result<()> {
    let store = ConfigStore::at_path(config_path(config_arg));
    let mut cfg = store.load_or_default()?;

    // Quick overrides for trying other endpoints without editing the file.
    if let Ok(url) = std::env::var("LLM_BASE_URL") {
        cfg.llm.base_url = url;
    }
    if let Ok(model) = std::env::var("LLM_MODEL") {
        cfg.llm.model = model;
    }

    let keys = ServiceKeys::resolve();
    log::debug!("config={} keys={keys:?}", store.path().display());

    let chat = build_chat(&cfg, &keys)?;
    println!("Mente Sana. Escribe un mensaje o /help.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let turns_before = chat.snapshot().turns.len();
        match line.trim() {
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/clear" => chat.clear_messages().await,
            "/retry" => {
                chat.retry_last_message().await;
                print_outcome(&chat, turns_before);
            }
            "/record" => {
                if chat.snapshot().is_recording {
                    chat.stop_recording().await;
                    print_outcome(&chat, turns_before);
                } else {
                    chat.start_recording().await;
                    let snap = chat.snapshot();
                    if snap.is_recording {
                        println!("grabando... escribe /record para terminar");
                    } else if let Some(err) = &snap.error {
                        println!("error> {err}");
                    }
                }
            }
            "/speak" => {
                let last = chat.snapshot().last_reply().map(|t| t.content.clone());
                match last {
                    Some(text) => chat.speak_message(&text).await,
                    None => println!("no hay respuestas para leer"),
                }
            }
            text => {
                chat.send_message(text, false).await;
                print_outcome(&chat, turns_before);
            }
        }
    }

    chat.dispose().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [cmd, key, value] if cmd == "set-key" => {
            let key: SecretKey = key.parse()?;
            set_secret(key, value.trim()).context("store key in the OS keyring")?;
            println!("clave guardada");
            Ok(())
        }
        [cmd, key] if cmd == "delete-key" => {
            let key: SecretKey = key.parse()?;
            delete_secret(key).context("remove key from the OS keyring")?;
            println!("clave eliminada");
            Ok(())
        }
        [cmd, ..] if cmd == "set-key" || cmd == "delete-key" || cmd == "--help" => {
            println!("{USAGE}");
            Ok(())
        }
        [] => run_chat(None).await,
        [path] => run_chat(Some(path.as_str())).await,
        _ => {
            println!("{USAGE}");
            Ok(())
        }
    }
}
