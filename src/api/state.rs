use std::sync::Arc;

use super::handlers::auth::AuthConfig;
use crate::catalog::Catalog;
use crate::rbac::{
    IdentityResolver, accounts::AccountService, admin::AdminService, token::TokenService,
};
use crate::store::Stores;

/// Shared request context, installed once as an `Extension<Arc<AppState>>`.
pub struct AppState {
    stores: Stores,
    tokens: Arc<TokenService>,
    identity: IdentityResolver,
    accounts: AccountService,
    admin: AdminService,
    catalog: Catalog,
    auth: AuthConfig,
}

impl AppState {
    #[must_use]
    pub fn new(stores: Stores, tokens: Arc<TokenService>, auth: AuthConfig) -> Self {
        let auth = auth
            .with_access_ttl_seconds(tokens.access_ttl_seconds())
            .with_refresh_ttl_seconds(tokens.refresh_ttl_seconds());
        Self {
            identity: IdentityResolver::new(tokens.clone(), stores.users.clone()),
            accounts: AccountService::new(stores.clone(), tokens.clone()),
            admin: AdminService::new(stores.clone()),
            catalog: Catalog::seeded(),
            stores,
            tokens,
            auth,
        }
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    #[must_use]
    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    #[must_use]
    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }
}
