//! Per-message orchestration. Every message that passed the channel's
//! addressing filter comes through `handle_message`, which routes it to one
//! of three branches: scrape-and-summarize (URL present), search-then-scrape
//! (`::search ..::`), or a direct model reply against the sender's
//! conversation context.

use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable};
use tracing::{error, info, warn};

use crate::channels::Delivery;
use crate::chunker;
use crate::config::Config;
use crate::context::{ConversationStore, Role};
use crate::directives::{self, Directives};
use crate::error::MagpieError;
use crate::fetch::FetchJobTracker;
use crate::inflight::InflightJobs;
use crate::llm::CompletionClient;
use crate::persona;
use crate::search::SearchClient;

const DIRECTIVE_NOTICE: &str =
    "Sorry, I couldn't parse a directive in that message. Check the value and try again.";
const SUBMIT_APOLOGY: &str =
    "Sorry, there was an issue starting the scraping job. Please try again later.";
const SEARCH_APOLOGY: &str = "Sorry, the web search failed. Please try again later.";
const COMPLETION_APOLOGY: &str = "Sorry, I couldn't generate a reply just now. Please try again.";

/// Everything a message handler needs, built once at startup and shared.
pub struct AppState {
    pub config: Config,
    pub store: ConversationStore,
    pub llm: CompletionClient,
    pub fetcher: FetchJobTracker,
    pub search: SearchClient,
    pub jobs: Arc<InflightJobs>,
}

impl AppState {
    pub fn from_config(config: Config) -> Self {
        AppState {
            store: ConversationStore::new(config.context_capacity),
            llm: CompletionClient::from_config(&config),
            fetcher: FetchJobTracker::from_config(&config),
            search: SearchClient::from_config(&config),
            jobs: Arc::new(InflightJobs::default()),
            config,
        }
    }
}

/// Handle one inbound message end to end. Branch failures that the sender
/// should hear about are reported through `dest` here; only delivery errors
/// propagate to the channel layer.
pub async fn handle_message(
    state: &Arc<AppState>,
    channel_id: u64,
    sender_id: u64,
    sender_name: &str,
    text: &str,
    dest: Arc<dyn Delivery>,
) -> Result<(), MagpieError> {
    let directives = match directives::parse(text) {
        Ok(d) => d,
        Err(MagpieError::Directive(reason)) => {
            warn!("Rejected directive from {sender_name}: {reason}");
            dest.send(DIRECTIVE_NOTICE).await?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if let Some(url) = &directives.url {
        info!("URL detected from {sender_name}: {url}");
        start_fetch_job(state, channel_id, url, dest).await?;
        return Ok(());
    }

    if let Some(query) = &directives.search_query {
        run_search(state, channel_id, query, dest).await?;
        return Ok(());
    }

    direct_reply(state, sender_id, sender_name, &directives, dest).await
}

/// Submit a scrape job and, on success, ack the sender and hand the rest of
/// the workflow to a background poll task. A failed submission never
/// schedules polling.
async fn start_fetch_job(
    state: &Arc<AppState>,
    channel_id: u64,
    url: &str,
    dest: Arc<dyn Delivery>,
) -> Result<(), MagpieError> {
    match state.fetcher.submit(url).await {
        Ok(job_id) => {
            dest.send(&format!(
                "Received your request to scrape {url}. I've started the job (ID: {job_id}), \
                 and I'll let you know when it's completed."
            ))
            .await?;
            spawn_poll(state.clone(), channel_id, job_id, dest);
            Ok(())
        }
        Err(e) => {
            error!("Scrape submission for {url} failed: {e}");
            dest.send(SUBMIT_APOLOGY).await?;
            Ok(())
        }
    }
}

/// Spawn the poll task for a submitted job. The task registers its abort
/// handle under the destination channel and unregisters when it reaches a
/// terminal state; terminal poll failures are logged, not reported to the
/// sender.
fn spawn_poll(state: Arc<AppState>, channel_id: u64, job_id: String, dest: Arc<dyn Delivery>) {
    let (abort_handle, registration) = AbortHandle::new_pair();
    let guard = state.jobs.register(channel_id, abort_handle);
    tokio::spawn(async move {
        let _guard = guard;
        let poll = state.fetcher.run(
            &job_id,
            &state.llm,
            &state.config.summary_model,
            state.config.default_temperature,
            dest.as_ref(),
            state.config.chunk_size,
        );
        match Abortable::new(poll, registration).await {
            Ok(Ok(())) => info!("Scrape job {job_id} delivered"),
            Ok(Err(e)) => error!("Scrape job {job_id} failed: {e}"),
            Err(_) => info!("Scrape job {job_id} poll canceled"),
        }
    });
}

/// Search the web, then push every result page through the same
/// submit-then-poll workflow as a directly pasted URL. Each summary arrives
/// independently as its job completes.
async fn run_search(
    state: &Arc<AppState>,
    channel_id: u64,
    query: &str,
    dest: Arc<dyn Delivery>,
) -> Result<(), MagpieError> {
    info!("Searching the web for: {query}");
    let results = match state.search.search(query).await {
        Ok(r) => r,
        Err(e) => {
            error!("Search for '{query}' failed: {e}");
            dest.send(SEARCH_APOLOGY).await?;
            return Ok(());
        }
    };
    if results.is_empty() {
        dest.send("No search results found.").await?;
        return Ok(());
    }
    for result in &results {
        start_fetch_job(state, channel_id, &result.url, dest.clone()).await?;
    }
    Ok(())
}

/// The default branch: append the cleaned text to the sender's context, ask
/// the model for a reply, and deliver it in chunks.
async fn direct_reply(
    state: &Arc<AppState>,
    sender_id: u64,
    sender_name: &str,
    directives: &Directives,
    dest: Arc<dyn Delivery>,
) -> Result<(), MagpieError> {
    let seed = persona::render(&state.config.persona, sender_name);
    let entry = state.store.get_or_create(sender_id, &seed);
    // Hold this sender's context across the whole append/complete/append
    // sequence; other senders run in parallel on their own entries.
    let mut context = entry.lock().await;
    context.push(Role::User, directives.cleaned_text.clone());
    let turns = context.snapshot();

    let model = directives
        .model
        .as_deref()
        .unwrap_or(&state.config.default_model);
    let temperature = directives
        .temperature
        .unwrap_or(state.config.default_temperature);

    match state.llm.complete(&turns, model, temperature).await {
        Ok(result) => {
            info!(
                "Reply for {sender_name} (cost: {:.4}, elapsed: {:.0}ms)",
                result.cost, result.elapsed_ms
            );
            context.push(Role::Assistant, result.text.clone());
            drop(context);
            chunker::deliver_chunked(dest.as_ref(), &result.text, state.config.chunk_size).await
        }
        Err(MagpieError::UnknownModel(model)) => {
            // The user turn stays appended; the next message still sees it.
            drop(context);
            dest.send(&format!(
                "I don't know the model '{model}'; it has no entry in cost_rates."
            ))
            .await
        }
        Err(e) => {
            error!("Completion for {sender_name} failed: {e}");
            drop(context);
            dest.send(COMPLETION_APOLOGY).await
        }
    }
}
