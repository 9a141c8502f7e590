use crate::routes::Route;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct NavigationBus {
    tx: mpsc::UnboundedSender<Route>,
}

impl NavigationBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn navigate(&self, route: Route) {
        if self.tx.send(route).is_err() {
            tracing::debug!("navigation dropped: no front end is listening");
        }
    }
}
