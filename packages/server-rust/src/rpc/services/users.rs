//! `users` service: account management.

use async_trait::async_trait;
use serde::Deserialize;
use streamgate_core::messages::UserCommand;
use streamgate_core::operation::USER_LOGIN;
use streamgate_core::operations::users;
use streamgate_core::{Command, CoreReply, Operation, StreamId};

use crate::rpc::descriptor::ServiceDescriptor;
use crate::rpc::service::{RpcCall, RpcService, ServiceDeps};
use crate::rpc::status::RpcError;

pub const NAME: &str = "users";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserRequest {
    login: Option<String>,
    full_name: String,
    groups: Vec<String>,
    password: String,
    current_password: String,
    new_password: String,
}

impl UserRequest {
    fn login(&self) -> Result<String, RpcError> {
        match self.login.as_deref().map(str::trim) {
            Some(login) if !login.is_empty() => Ok(login.to_string()),
            _ => Err(RpcError::invalid("login must not be empty")),
        }
    }
}

fn non_empty(field: &'static str, value: String) -> Result<String, RpcError> {
    if value.is_empty() {
        Err(RpcError::invalid(format!("{field} must not be empty")))
    } else {
        Ok(value)
    }
}

pub struct UsersService<S: StreamId> {
    deps: ServiceDeps<S>,
    descriptor: ServiceDescriptor,
}

impl<S: StreamId> UsersService<S> {
    #[must_use]
    pub fn new(deps: ServiceDeps<S>, max_message_size: usize) -> Self {
        let descriptor = ServiceDescriptor::new(NAME, max_message_size)
            .method("Create", users::CREATE)
            .method("Update", users::UPDATE)
            .method("Delete", users::DELETE)
            .method("Enable", users::ENABLE)
            .method("Disable", users::DISABLE)
            .method("Details", users::READ)
            .method("ChangePassword", users::CHANGE_PASSWORD)
            .method("ResetPassword", users::RESET_PASSWORD);
        Self { deps, descriptor }
    }

    fn command(method: &str, req: UserRequest) -> Result<UserCommand, RpcError> {
        Ok(match method {
            "Create" => UserCommand::Create {
                login: req.login()?,
                full_name: req.full_name,
                groups: req.groups,
                password: non_empty("password", req.password)?,
            },
            "Update" => UserCommand::Update {
                login: req.login()?,
                full_name: req.full_name,
                groups: req.groups,
            },
            "Delete" => UserCommand::Delete { login: req.login()? },
            "Enable" => UserCommand::Enable { login: req.login()? },
            "Disable" => UserCommand::Disable { login: req.login()? },
            "ChangePassword" => UserCommand::ChangePassword {
                login: req.login()?,
                current_password: non_empty("currentPassword", req.current_password)?,
                new_password: non_empty("newPassword", req.new_password)?,
            },
            _ => UserCommand::ResetPassword {
                login: req.login()?,
                new_password: non_empty("newPassword", req.new_password)?,
            },
        })
    }
}

#[async_trait]
impl<S: StreamId> RpcService for UsersService<S> {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(&self, call: RpcCall) -> Result<CoreReply, RpcError> {
        let Some(method) = self.descriptor.find(&call.method).copied() else {
            return Err(call.unimplemented(NAME));
        };
        let req: UserRequest = call.decode()?;

        // Details without a login lists every account.
        let (op, command) = if method.name == "Details" {
            match req.login {
                Some(login) if !login.is_empty() => (
                    Operation::new(users::READ).with_parameter(USER_LOGIN, &login),
                    UserCommand::Details { login: Some(login) },
                ),
                _ => (Operation::new(users::LIST), UserCommand::Details { login: None }),
            }
        } else {
            let command = Self::command(method.name, req)?;
            let login = match &command {
                UserCommand::Create { login, .. }
                | UserCommand::Update { login, .. }
                | UserCommand::Delete { login }
                | UserCommand::Enable { login }
                | UserCommand::Disable { login }
                | UserCommand::ChangePassword { login, .. }
                | UserCommand::ResetPassword { login, .. } => login.clone(),
                UserCommand::Details { login } => login.clone().unwrap_or_default(),
            };
            (
                Operation::new(method.operation).with_parameter(USER_LOGIN, login),
                command,
            )
        };
        self.deps.execute(&call, op, Command::Users(command)).await
    }
}
