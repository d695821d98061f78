// OpenAPI schema generator
// Hand-written document for the sign-in endpoints

use serde_json::json;

pub fn generate_openapi_spec(version: &str) -> serde_json::Value {
    let error = json!({ "$ref": "#/components/schemas/Error" });
    let error_response = |description: &str| {
        json!({
            "description": description,
            "content": { "application/json": { "schema": error } }
        })
    };

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Garden of Giving Auth API",
            "description": "Wallet-signature sign-in: challenge issuance, signature verification, identity provisioning and sessions",
            "version": version
        },
        "servers": [
            {
                "url": "http://localhost:8080",
                "description": "Development server"
            }
        ],
        "paths": {
            "/api/auth/challenge": {
                "get": {
                    "summary": "Issue a sign-in challenge",
                    "description": "Returns a fresh single-use message for the wallet to sign",
                    "tags": ["auth"],
                    "responses": {
                        "200": {
                            "description": "Challenge issued",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Challenge" } } }
                        },
                        "429": error_response("Too many requests from this client"),
                        "500": error_response("Random source or challenge store failure")
                    }
                }
            },
            "/api/auth/verify": {
                "post": {
                    "summary": "Verify a signed challenge",
                    "description": "Checks the signature over the exact challenge message, provisions the wallet's profile on first sign-in and opens a session",
                    "tags": ["auth"],
                    "requestBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/VerifyRequest" } } }
                    },
                    "responses": {
                        "200": {
                            "description": "Signature accepted",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/VerifyResponse" } } }
                        },
                        "400": error_response("Missing or invalid parameters"),
                        "401": error_response("Challenge rejected, bad key or signature encoding, or signature mismatch"),
                        "429": error_response("Too many requests from this client"),
                        "500": error_response("Identity or session store failure")
                    }
                }
            },
            "/api/auth/session": {
                "get": {
                    "summary": "Resolve the current session",
                    "tags": ["auth"],
                    "security": [{ "bearerAuth": [] }],
                    "responses": {
                        "200": {
                            "description": "Session is live",
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/SessionResponse" } } }
                        },
                        "401": error_response("Missing, unknown or expired token")
                    }
                }
            },
            "/api/auth/logout": {
                "post": {
                    "summary": "Revoke the current session",
                    "tags": ["auth"],
                    "security": [{ "bearerAuth": [] }],
                    "responses": {
                        "204": { "description": "Session revoked or already gone" },
                        "401": error_response("No bearer token supplied")
                    }
                }
            },
            "/healthz": {
                "get": {
                    "summary": "Liveness probe",
                    "tags": ["ops"],
                    "responses": { "200": { "description": "Process is up" } }
                }
            },
            "/readyz": {
                "get": {
                    "summary": "Readiness probe",
                    "tags": ["ops"],
                    "responses": {
                        "200": { "description": "All enabled dependencies respond" },
                        "503": { "description": "A dependency is failing" }
                    }
                }
            }
        },
        "components": {
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer" }
            },
            "schemas": {
                "Challenge": {
                    "type": "object",
                    "required": ["message", "nonce", "timestamp"],
                    "properties": {
                        "message": { "type": "string", "description": "Exact text to sign" },
                        "nonce": { "type": "string", "format": "uuid" },
                        "timestamp": { "type": "integer", "format": "int64", "description": "Issue time, epoch milliseconds" }
                    }
                },
                "VerifyRequest": {
                    "type": "object",
                    "required": ["publicKey", "signature", "message", "walletAddress"],
                    "properties": {
                        "publicKey": { "type": "string", "description": "Ed25519 public key in the configured encoding" },
                        "signature": { "type": "string", "description": "Ed25519 signature in the configured encoding" },
                        "message": { "type": "string" },
                        "walletAddress": { "type": "string", "maxLength": 128 }
                    }
                },
                "User": {
                    "type": "object",
                    "required": ["id", "wallet_address", "public_key", "display_name"],
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "wallet_address": { "type": "string" },
                        "public_key": { "type": "string" },
                        "display_name": { "type": "string" },
                        "avatar_url": { "type": "string" }
                    }
                },
                "Session": {
                    "type": "object",
                    "required": ["access_token", "expires_at"],
                    "properties": {
                        "access_token": { "type": "string" },
                        "expires_at": { "type": "string", "format": "date-time" }
                    }
                },
                "VerifyResponse": {
                    "type": "object",
                    "required": ["success", "user", "session"],
                    "properties": {
                        "success": { "type": "boolean" },
                        "user": { "$ref": "#/components/schemas/User" },
                        "session": { "$ref": "#/components/schemas/Session" }
                    }
                },
                "SessionResponse": {
                    "type": "object",
                    "required": ["user", "session"],
                    "properties": {
                        "user": { "$ref": "#/components/schemas/User" },
                        "session": { "$ref": "#/components/schemas/Session" }
                    }
                },
                "Error": {
                    "type": "object",
                    "required": ["error"],
                    "properties": {
                        "error": { "type": "string" },
                        "details": { "type": "string" },
                        "missing": { "type": "array", "items": { "type": "string" } }
                    }
                }
            }
        }
    })
}
