use crate::agent::AIAgent;
use crate::chat::MessageSender;

use log::{ error, info, warn };
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{ Mutex, Semaphore };
use tokio::task::JoinHandle;

/// One chat message waiting for a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayJob {
    pub thread_name: String,
    pub conversation_key: String,
    pub text: String,
}

/// Runs relay jobs in the background. Jobs of the same conversation run one
/// at a time; across conversations at most `max_concurrent` run at once.
#[derive(Clone)]
pub struct Dispatcher {
    agent: Arc<AIAgent>,
    sender: Arc<dyn MessageSender>,
    permits: Arc<Semaphore>,
    conversation_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl Dispatcher {
    pub fn new(agent: Arc<AIAgent>, sender: Arc<dyn MessageSender>, max_concurrent: usize) -> Self {
        Self {
            agent,
            sender,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            conversation_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dispatch(&self, job: RelayJob) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run(job).await })
    }

    async fn conversation_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.conversation_locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }

    async fn release_conversation(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.conversation_locks.lock().await;
        // Only the map and this job still hold it: nobody is waiting.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(key);
        }
    }

    async fn run(&self, job: RelayJob) {
        let lock = self.conversation_lock(&job.conversation_key).await;
        {
            let _turn = lock.lock().await;
            match self.permits.acquire().await {
                Ok(_permit) => {
                    let reply = self.agent.respond(&job.conversation_key, &job.text).await;
                    match self.sender.send(&job.thread_name, &reply).await {
                        Ok(()) => info!("Reply relayed to {}", job.thread_name),
                        Err(e) => error!("Error sending to GChat ({}): {}", job.thread_name, e),
                    }
                }
                Err(e) => warn!("Dropping reply for {}: {}", job.thread_name, e),
            }
        }
        self.release_conversation(&job.conversation_key, lock).await;
    }

    #[cfg(test)]
    pub(crate) fn close(&self) {
        self.permits.close();
    }

    #[cfg(test)]
    pub(crate) async fn tracked_conversations(&self) -> usize {
        self.conversation_locks.lock().await.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::FALLBACK_REPLY;
    use crate::error::RelayError;
    use crate::history::{ HistoryStore, MemoryHistoryStore };
    use crate::llm::{ ChatClient, CompletionResponse };
    use async_trait::async_trait;
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use std::time::Duration;

    /// Collects delivered replies; optionally fails every send.
    #[derive(Default)]
    pub(crate) struct RecordingSender {
        pub sent: Mutex<Vec<(String, String)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, thread_name: &str, text: &str) -> Result<(), RelayError> {
            self.sent.lock().await.push((thread_name.to_string(), text.to_string()));
            if self.fail {
                return Err(RelayError::Delivery("503".to_string()));
            }
            Ok(())
        }
    }

    /// Echoes the last prompt line after a pause, tracking overlap.
    struct SlowEcho {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ChatClient for SlowEcho {
        async fn complete(&self, prompt: &str) -> Result<CompletionResponse, RelayError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            let last = prompt.lines().last().unwrap_or_default().to_string();
            Ok(CompletionResponse { response: format!("echo {}", last) })
        }

        fn get_model(&self) -> String {
            "echo".to_string()
        }
    }

    fn slow_echo() -> Arc<SlowEcho> {
        Arc::new(SlowEcho { running: AtomicUsize::new(0), peak: AtomicUsize::new(0) })
    }

    fn job(key: &str, text: &str) -> RelayJob {
        RelayJob {
            thread_name: format!("{}/threads/T", key),
            conversation_key: key.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn reply_is_generated_and_delivered_to_thread() {
        let store = Arc::new(MemoryHistoryStore::new(5));
        let agent = Arc::new(AIAgent::new(slow_echo(), store.clone(), 5));
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(agent, sender.clone(), 4);

        dispatcher.dispatch(job("spaces/A", "Hi")).await.unwrap();

        assert_eq!(
            *sender.sent.lock().await,
            vec![("spaces/A/threads/T".to_string(), "echo user: Hi".to_string())]
        );
        assert_eq!(store.last("spaces/A", 5).await.unwrap().len(), 2);
        assert_eq!(dispatcher.tracked_conversations().await, 0);
    }

    #[tokio::test]
    async fn same_conversation_never_overlaps() {
        let chat = slow_echo();
        let store = Arc::new(MemoryHistoryStore::new(10));
        let agent = Arc::new(AIAgent::new(chat.clone(), store.clone(), 10));
        let dispatcher = Dispatcher::new(agent, Arc::new(RecordingSender::default()), 8);

        let handles: Vec<_> = (0..4)
            .map(|i| dispatcher.dispatch(job("spaces/A", &format!("m{}", i))))
            .collect();
        for h in futures::future::join_all(handles).await {
            h.unwrap();
        }

        assert_eq!(chat.peak.load(Ordering::SeqCst), 1);
        // Every exchange landed as an intact user/ai pair.
        let turns = store.last("spaces/A", 10).await.unwrap();
        assert_eq!(turns.len(), 8);
        for pair in turns.chunks(2) {
            assert_eq!(pair[1].text, format!("echo user: {}", pair[0].text));
        }
    }

    #[tokio::test]
    async fn global_limit_caps_parallel_conversations() {
        let chat = slow_echo();
        let agent = Arc::new(AIAgent::new(chat.clone(), Arc::new(MemoryHistoryStore::new(5)), 5));
        let dispatcher = Dispatcher::new(agent, Arc::new(RecordingSender::default()), 2);

        let handles: Vec<_> = (0..6)
            .map(|i| dispatcher.dispatch(job(&format!("spaces/{}", i), "Hi")))
            .collect();
        for h in futures::future::join_all(handles).await {
            h.unwrap();
        }

        assert!(chat.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(dispatcher.tracked_conversations().await, 0);
    }

    #[tokio::test]
    async fn failed_completion_delivers_fallback_and_failed_send_is_contained() {
        struct Down;

        #[async_trait]
        impl ChatClient for Down {
            async fn complete(&self, _: &str) -> Result<CompletionResponse, RelayError> {
                Err(RelayError::Upstream("timeout".to_string()))
            }
            fn get_model(&self) -> String {
                "down".to_string()
            }
        }

        let agent = Arc::new(AIAgent::new(Arc::new(Down), Arc::new(MemoryHistoryStore::new(5)), 5));
        let sender = Arc::new(RecordingSender { fail: true, ..Default::default() });
        let dispatcher = Dispatcher::new(agent, sender.clone(), 1);

        dispatcher.dispatch(job("spaces/A", "Hi")).await.unwrap();

        assert_eq!(sender.sent.lock().await[0].1, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn closed_dispatcher_drops_job_and_forgets_conversation() {
        let chat = slow_echo();
        let agent = Arc::new(AIAgent::new(chat.clone(), Arc::new(MemoryHistoryStore::new(5)), 5));
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(agent, sender.clone(), 2);

        dispatcher.close();
        dispatcher.dispatch(job("spaces/A", "Hi")).await.unwrap();

        assert_eq!(chat.peak.load(Ordering::SeqCst), 0);
        assert!(sender.sent.lock().await.is_empty());
        assert_eq!(dispatcher.tracked_conversations().await, 0);
    }
}
