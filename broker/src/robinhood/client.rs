//! Robinhood REST API client.

use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use zeroize::Zeroizing;

use super::types::{
    AccountInfo, Instrument, OrderRequest, OrderResponse, Page, PortfolioInfo, PositionInfo,
    QuoteInfo, TokenResponse,
};
use crate::error::BrokerError;

/// Public OAuth client id used by Robinhood's web app.
pub const CLIENT_ID: &str = "c82SH0WZOsabOXGP2sxqcj34FxkvfnWRZBKlBjFS";

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.robinhood.com";

/// Token lifetime requested at login.
const TOKEN_EXPIRES_SECS: u64 = 86_400;

/// Blocking Robinhood REST client.
pub struct RobinhoodClient {
    client: Client,
    base_url: String,
    device_token: String,
    token: Option<Zeroizing<String>>,
}

impl RobinhoodClient {
    /// Create a new client (no session yet).
    pub fn new(base_url: &str, timeout: Duration, device_token: &str) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            device_token: device_token.to_string(),
            token: None,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, BrokerError> {
        let token = self.token.as_ref().ok_or(BrokerError::NotLoggedIn)?;
        Ok(req.bearer_auth(token.as_str()))
    }

    /// Password grant with MFA code (POST /oauth2/token/).
    pub fn login(&mut self, username: &str, password: &str, mfa_code: &str) -> Result<(), BrokerError> {
        let expires = TOKEN_EXPIRES_SECS.to_string();
        let form = [
            ("client_id", CLIENT_ID),
            ("expires_in", expires.as_str()),
            ("grant_type", "password"),
            ("scope", "internal"),
            ("username", username),
            ("password", password),
            ("mfa_code", mfa_code),
            ("device_token", self.device_token.as_str()),
        ];

        debug!("Requesting Robinhood token for {username}");

        let resp = self
            .client
            .post(self.url("/oauth2/token/"))
            .form(&form)
            .send()
            .map_err(|e| BrokerError::Connection(format!("login request failed: {e}")))?;

        let status = resp.status();
        let body: TokenResponse = resp
            .json()
            .map_err(|e| BrokerError::Parse(format!("failed to parse token response: {e}")))?;

        self.token = Some(Zeroizing::new(token_from_response(status.as_u16(), body)?));
        Ok(())
    }

    /// Revoke the session token (POST /oauth2/revoke_token/).
    pub fn logout(&mut self) -> Result<(), BrokerError> {
        let Some(token) = self.token.take() else {
            return Ok(());
        };

        let form = [("client_id", CLIENT_ID), ("token", token.as_str())];
        let resp = self
            .client
            .post(self.url("/oauth2/revoke_token/"))
            .form(&form)
            .send()
            .map_err(|e| BrokerError::Connection(format!("logout request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(BrokerError::Connection(format!(
                "revoke_token returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, BrokerError> {
        debug!("GET {url}");
        let resp = self
            .authorized(self.client.get(url))?
            .send()
            .map_err(|e| BrokerError::Connection(format!("{what} request failed: {e}")))?;
        parse_json(resp, what)
    }

    /// Follow `next` links until exhausted.
    fn get_all<T: DeserializeOwned>(&self, first: &str, what: &str) -> Result<Vec<T>, BrokerError> {
        let mut out = Vec::new();
        let mut next = Some(first.to_string());
        while let Some(url) = next {
            let page: Page<T> = self.get(&url, what)?;
            out.extend(page.results);
            next = page.next;
        }
        Ok(out)
    }

    /// Non-zero positions (GET /positions/?nonzero=true).
    pub fn positions(&self) -> Result<Vec<PositionInfo>, BrokerError> {
        self.get_all(&self.url("/positions/?nonzero=true"), "positions")
    }

    /// Instrument by its resource URL.
    pub fn instrument(&self, url: &str) -> Result<Instrument, BrokerError> {
        self.get(url, "instrument")
    }

    /// Instrument by ticker (GET /instruments/?symbol=...).
    pub fn instrument_by_symbol(&self, symbol: &str) -> Result<Instrument, BrokerError> {
        let page: Page<Instrument> =
            self.get(&self.url(&format!("/instruments/?symbol={symbol}")), "instrument")?;
        page.results
            .into_iter()
            .next()
            .ok_or_else(|| BrokerError::InvalidSymbol(symbol.to_string()))
    }

    /// Quotes for several tickers at once (GET /quotes/?symbols=...).
    pub fn quotes(&self, symbols: &[&str]) -> Result<Vec<QuoteInfo>, BrokerError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url(&format!("/quotes/?symbols={}", symbols.join(",")));
        let page: Page<QuoteInfo> = self.get(&url, "quotes")?;
        Ok(page.results)
    }

    /// The first brokerage account (GET /accounts/).
    pub fn account(&self) -> Result<AccountInfo, BrokerError> {
        let page: Page<AccountInfo> = self.get(&self.url("/accounts/"), "accounts")?;
        page.results
            .into_iter()
            .next()
            .ok_or_else(|| BrokerError::Other("no brokerage account on this login".into()))
    }

    /// The first portfolio (GET /portfolios/).
    pub fn portfolio(&self) -> Result<PortfolioInfo, BrokerError> {
        let page: Page<PortfolioInfo> = self.get(&self.url("/portfolios/"), "portfolios")?;
        page.results
            .into_iter()
            .next()
            .ok_or_else(|| BrokerError::Other("no portfolio on this login".into()))
    }

    /// Submit an order (POST /orders/).
    pub fn submit_order(&self, order: &OrderRequest) -> Result<OrderResponse, BrokerError> {
        debug!(
            "Submitting Robinhood order: {} {} ${}",
            order.side, order.symbol, order.dollar_based_amount.amount
        );

        let resp = self
            .authorized(self.client.post(self.url("/orders/")))?
            .json(order)
            .send()
            .map_err(|e| BrokerError::Order(format!("order request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(BrokerError::Order(format!("order returned {status}: {body}")));
        }

        resp.json::<OrderResponse>()
            .map_err(|e| BrokerError::Order(format!("failed to parse order response: {e}")))
    }
}

fn parse_json<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T, BrokerError> {
    let status = resp.status();
    if status.as_u16() == 401 {
        return Err(BrokerError::NotLoggedIn);
    }
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(BrokerError::Connection(format!("{what} returned {status}: {body}")));
    }
    resp.json::<T>()
        .map_err(|e| BrokerError::Parse(format!("failed to parse {what}: {e}")))
}

/// Turn a token response into an access token or an auth error.
pub fn token_from_response(status: u16, body: TokenResponse) -> Result<String, BrokerError> {
    if let Some(token) = body.access_token.filter(|t| !t.is_empty()) {
        return Ok(token);
    }
    if body.mfa_required == Some(true) {
        return Err(BrokerError::Auth("MFA code rejected or missing".into()));
    }
    let detail = body.detail.unwrap_or_else(|| "no access token in response".into());
    Err(BrokerError::Auth(format!("login returned {status}: {detail}")))
}
