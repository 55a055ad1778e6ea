use tokio::time::sleep;
use tracing::{info, warn};

use crate::state::SharedState;

/// Periodically refresh the list of healthy sibling instances from the load
/// balancer's health endpoint. A failed poll keeps the previous list.
pub async fn run(state: SharedState) {
    let Some(url) = state.config().peer_health_url.clone() else {
        info!("peer discovery disabled; running as a single instance");
        return;
    };
    let interval = state.config().peer_refresh;
    let self_addr = state.config().self_addr.clone();

    loop {
        match fetch_peers(state.http(), &url).await {
            Ok(listed) => {
                let peers = filter_peers(listed, self_addr.as_deref());
                state.set_peers(peers).await;
            }
            Err(err) => {
                warn!(error = %err, "peer discovery poll failed; keeping previous peer list");
            }
        }
        sleep(interval).await;
    }
}

async fn fetch_peers(client: &reqwest::Client, url: &str) -> Result<Vec<String>, reqwest::Error> {
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<Vec<String>>()
        .await
}

/// Drop this instance's own address and duplicates from the discovered list.
fn filter_peers(mut listed: Vec<String>, self_addr: Option<&str>) -> Vec<String> {
    listed.retain(|peer| !peer.is_empty() && Some(peer.as_str()) != self_addr);
    listed.sort();
    listed.dedup();
    listed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_self_and_duplicates() {
        let listed = vec![
            "10.0.0.2:8080".to_owned(),
            "10.0.0.1:8080".to_owned(),
            "10.0.0.2:8080".to_owned(),
            "".to_owned(),
        ];
        let peers = filter_peers(listed, Some("10.0.0.1:8080"));
        assert_eq!(peers, vec!["10.0.0.2:8080".to_owned()]);
    }

    #[test]
    fn keeps_everything_without_self_addr() {
        let listed = vec!["10.0.0.1:8080".to_owned(), "10.0.0.2:8080".to_owned()];
        assert_eq!(filter_peers(listed.clone(), None), listed);
    }
}
